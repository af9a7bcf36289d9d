//! Checkpoint resolution
//!
//! The resume position is never stored on its own; it is read back from the
//! tail of the persisted document. This only works because comments and
//! replies are appended in fetch order and never reordered afterwards.

use crate::model::Comment;

/// Where the previous run left off
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePoint {
    /// Id of the last stored comment
    pub last_comment_id: Option<String>,
    /// Id of the last reply stored under that comment
    pub last_reply_id: Option<String>,
}

impl ResumePoint {
    /// Derives the resume position from a persisted document
    ///
    /// | Document                         | Result               |
    /// |----------------------------------|----------------------|
    /// | empty                            | `(None, None)`       |
    /// | last comment has no replies      | `(Some(c), None)`    |
    /// | last comment has replies         | `(Some(c), Some(r))` |
    pub fn resolve(comments: &[Comment]) -> Self {
        match comments.last() {
            None => Self::default(),
            Some(last) => Self {
                last_comment_id: Some(last.id.clone()),
                last_reply_id: last.last_reply_id().map(str::to_string),
            },
        }
    }

    /// True when there is nothing to resume
    pub fn is_fresh(&self) -> bool {
        self.last_comment_id.is_none()
    }
}
