//! Storage traits and error types
//!
//! This module defines the trait interface for comment document backends and
//! associated error types.

use crate::model::{Comment, Reply};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document {path} is not a valid comment list: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Comment not found: {0}")]
    CommentNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One mutation of the comment tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadUpdate {
    /// A comment seen for the first time, with whatever replies were collected for it
    NewComment(Comment),

    /// Replies continuing an already stored comment
    Replies {
        comment_id: String,
        replies: Vec<Reply>,
    },
}

/// Trait for comment document backends
///
/// The store is the single owner of the canonical comment tree. Every
/// mutating call is durable once it returns `Ok`. Mutations only ever
/// append, so the order of comments and of replies within a comment always
/// matches the order in which they were handed to the store.
pub trait CommentStore {
    /// All stored comments, in append order
    fn comments(&self) -> &[Comment];

    /// Appends a new comment
    ///
    /// Returns `false` without writing if a comment with the same id is
    /// already stored.
    fn append_comment(&mut self, comment: Comment) -> StorageResult<bool>;

    /// Appends one reply to a stored comment
    ///
    /// Returns `false` without writing if the comment already holds a reply
    /// with the same id.
    fn append_reply(&mut self, comment_id: &str, reply: Reply) -> StorageResult<bool>;

    /// Applies a batch of updates with a single durable write
    ///
    /// Items that would duplicate stored ids are dropped. The returned
    /// updates contain exactly what was stored.
    fn apply(&mut self, updates: Vec<ThreadUpdate>) -> StorageResult<Vec<ThreadUpdate>>;

    /// Total number of stored replies across all comments
    fn reply_count(&self) -> usize {
        self.comments().iter().map(|c| c.replies.len()).sum()
    }
}
