//! Reply stream state machine for resumable reply collection
//!
//! A reply stream of a comment is consumed page by page. When the previous
//! run stopped in the middle of this comment's replies, everything up to and
//! including the last stored reply is discarded before collecting resumes.

use crate::model::Reply;
use std::fmt;
use thiserror::Error;

/// The boundary reply was never seen in the re-fetched stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("comment {comment_id}: reply {reply_id} not found after scanning {scanned} replies")]
pub struct ResumeDrift {
    pub comment_id: String,
    pub reply_id: String,
    pub scanned: usize,
}

/// Current state of a reply stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStreamState {
    /// No page received yet
    AwaitingPage,

    /// Discarding already stored replies until `boundary` shows up
    SkippingToBoundary { boundary: String, scanned: usize },

    /// Every further reply is new
    Collecting,

    /// The stream has ended, normally or not; nothing more is accepted
    Exhausted,
}

impl fmt::Display for ReplyStreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingPage => write!(f, "awaiting_page"),
            Self::SkippingToBoundary { .. } => write!(f, "skipping_to_boundary"),
            Self::Collecting => write!(f, "collecting"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Filters one comment's reply pages into the replies that still need storing
#[derive(Debug, Clone)]
pub struct ReplyStream {
    comment_id: String,
    resume_after: Option<String>,
    max_skip: Option<usize>,
    state: ReplyStreamState,
}

impl ReplyStream {
    /// Creates a stream that keeps every reply
    pub fn new(comment_id: impl Into<String>) -> Self {
        Self {
            comment_id: comment_id.into(),
            resume_after: None,
            max_skip: None,
            state: ReplyStreamState::AwaitingPage,
        }
    }

    /// Creates a stream that discards replies up to and including `last_reply_id`
    ///
    /// With `max_skip` set, scanning that many replies without meeting the
    /// boundary is reported as drift instead of running to the end of the
    /// stream.
    pub fn resuming(
        comment_id: impl Into<String>,
        last_reply_id: Option<String>,
        max_skip: Option<usize>,
    ) -> Self {
        Self {
            comment_id: comment_id.into(),
            resume_after: last_reply_id,
            max_skip,
            state: ReplyStreamState::AwaitingPage,
        }
    }

    pub fn comment_id(&self) -> &str {
        &self.comment_id
    }

    pub fn state(&self) -> &ReplyStreamState {
        &self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ReplyStreamState::Exhausted
    }

    /// Feeds one fetched page through the state machine
    ///
    /// Returns the replies of this page that are new. A final page
    /// (`has_more == false`) moves the stream to `Exhausted`; if the boundary
    /// was still outstanding at that point, or the skip window ran out, the
    /// stream fails with [`ResumeDrift`].
    pub fn accept_page(
        &mut self,
        replies: Vec<Reply>,
        has_more: bool,
    ) -> Result<Vec<Reply>, ResumeDrift> {
        if self.state == ReplyStreamState::AwaitingPage {
            self.state = match self.resume_after.take() {
                Some(boundary) => ReplyStreamState::SkippingToBoundary {
                    boundary,
                    scanned: 0,
                },
                None => ReplyStreamState::Collecting,
            };
        }

        let mut fresh = Vec::new();
        for reply in replies {
            match &mut self.state {
                ReplyStreamState::SkippingToBoundary { boundary, scanned } => {
                    *scanned += 1;
                    if reply.id == *boundary {
                        tracing::debug!(
                            "Comment {}: found resume boundary {} after {} replies",
                            self.comment_id,
                            boundary,
                            scanned
                        );
                        self.state = ReplyStreamState::Collecting;
                    } else if self.max_skip.is_some_and(|max| *scanned >= max) {
                        return Err(self.drift());
                    }
                }
                ReplyStreamState::Collecting => fresh.push(reply),
                ReplyStreamState::AwaitingPage | ReplyStreamState::Exhausted => break,
            }
        }

        if !has_more {
            if matches!(self.state, ReplyStreamState::SkippingToBoundary { .. }) {
                return Err(self.drift());
            }
            self.state = ReplyStreamState::Exhausted;
        }

        Ok(fresh)
    }

    /// Ends the stream early after a failed page fetch
    pub fn abandon(&mut self) {
        self.state = ReplyStreamState::Exhausted;
    }

    fn drift(&mut self) -> ResumeDrift {
        let (reply_id, scanned) = match &self.state {
            ReplyStreamState::SkippingToBoundary { boundary, scanned } => {
                (boundary.clone(), *scanned)
            }
            _ => (String::new(), 0),
        };
        self.state = ReplyStreamState::Exhausted;
        ResumeDrift {
            comment_id: self.comment_id.clone(),
            reply_id,
            scanned,
        }
    }
}
