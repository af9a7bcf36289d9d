//! Dedup tracking for parent comments

use crate::model::Comment;
use crate::state::ResumePoint;
use std::collections::HashSet;

/// Decides which comments of a comment page still need work
///
/// The snapshot holds every comment id stored when the run started and is
/// never touched by this run's own insertions. Comments completed during the
/// run go into a separate set, so a comment the upstream repeats across pages
/// is not walked twice.
#[derive(Debug, Clone)]
pub struct ProcessedComments {
    snapshot: HashSet<String>,
    completed: HashSet<String>,
    /// Comment whose reply stream was interrupted by the previous run
    boundary: Option<String>,
}

impl ProcessedComments {
    pub fn new(comments: &[Comment], resume: &ResumePoint) -> Self {
        Self {
            snapshot: comments.iter().map(|c| c.id.clone()).collect(),
            completed: HashSet::new(),
            boundary: resume.last_comment_id.clone(),
        }
    }

    /// True if the comment must not be processed again
    ///
    /// The boundary comment is already stored but its reply list may be
    /// incomplete, so it is revisited once while reply-resume is active.
    pub fn should_skip(&self, id: &str) -> bool {
        if self.is_boundary(id) {
            return false;
        }
        self.snapshot.contains(id) || self.completed.contains(id)
    }

    /// True if `id` is the boundary comment and reply-resume is still active
    pub fn is_boundary(&self, id: &str) -> bool {
        self.boundary.as_deref() == Some(id)
    }

    /// True if the comment is already in the document
    pub fn is_stored(&self, id: &str) -> bool {
        self.snapshot.contains(id) || self.completed.contains(id)
    }

    /// Records that a comment and its replies have been handled in this run
    ///
    /// Completing the boundary comment ends reply-resume mode.
    pub fn mark_completed(&mut self, id: &str) {
        if self.is_boundary(id) {
            self.boundary = None;
        }
        self.completed.insert(id.to_string());
    }

    /// Number of comments stored before this run started
    pub fn initial_len(&self) -> usize {
        self.snapshot.len()
    }
}
