//! JSON document storage implementation
//!
//! The whole comment tree lives in one pretty-printed JSON array. Every
//! mutation rewrites the document into a temporary file next to it, syncs
//! it, renames it over the original and syncs the directory, so a crash
//! leaves either the old or the new document on disk and never a torn one.

use crate::model::{Comment, Reply};
use crate::storage::traits::{CommentStore, StorageError, StorageResult, ThreadUpdate};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Single-file JSON comment store
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    comments: Vec<Comment>,
    /// Comment id to position in `comments`
    index: HashMap<String, usize>,
}

impl JsonFileStore {
    /// Opens the document at `path`, loading any comments it already holds
    ///
    /// A missing or blank file is an empty document. A file that exists but
    /// does not parse is an error: overwriting it would destroy the only
    /// record of the previous runs.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let comments = match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Loaded {} comments from {}",
            comments.len(),
            path.display()
        );

        Ok(Self::from_comments(path, comments))
    }

    /// Starts an empty document at `path`, ignoring anything stored there
    ///
    /// The file on disk is left untouched until the first mutation.
    pub fn fresh(path: &Path) -> Self {
        Self::from_comments(path, Vec::new())
    }

    fn from_comments(path: &Path, comments: Vec<Comment>) -> Self {
        let mut index = HashMap::with_capacity(comments.len());
        for (position, comment) in comments.iter().enumerate() {
            if index.contains_key(&comment.id) {
                tracing::warn!(
                    "Document {} holds comment {} more than once; keeping the first",
                    path.display(),
                    comment.id
                );
                continue;
            }
            index.insert(comment.id.clone(), position);
        }

        Self {
            path: path.to_path_buf(),
            comments,
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the full document atomically
    fn persist(&self) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let serialized = serde_json::to_vec_pretty(&self.comments)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&serialized)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        sync_dir(&dir)?;

        tracing::trace!(
            "Persisted {} comments to {}",
            self.comments.len(),
            self.path.display()
        );
        Ok(())
    }

    fn push_comment(&mut self, mut comment: Comment) -> Comment {
        let mut seen = HashSet::new();
        comment.replies.retain(|r| seen.insert(r.id.clone()));
        self.index.insert(comment.id.clone(), self.comments.len());
        self.comments.push(comment.clone());
        comment
    }

    fn position(&self, comment_id: &str) -> StorageResult<usize> {
        self.index
            .get(comment_id)
            .copied()
            .ok_or_else(|| StorageError::CommentNotFound(comment_id.to_string()))
    }
}

/// Flushes a directory entry so a completed rename survives power loss
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CommentStore for JsonFileStore {
    fn comments(&self) -> &[Comment] {
        &self.comments
    }

    fn append_comment(&mut self, comment: Comment) -> StorageResult<bool> {
        if self.index.contains_key(&comment.id) {
            tracing::warn!("Comment {} is already stored, not appending", comment.id);
            return Ok(false);
        }

        self.push_comment(comment);
        self.persist()?;
        Ok(true)
    }

    fn append_reply(&mut self, comment_id: &str, reply: Reply) -> StorageResult<bool> {
        let position = self.position(comment_id)?;
        let comment = &mut self.comments[position];

        if comment.has_reply(&reply.id) {
            tracing::warn!(
                "Reply {} is already stored under comment {}, not appending",
                reply.id,
                comment_id
            );
            return Ok(false);
        }

        comment.replies.push(reply);
        self.persist()?;
        Ok(true)
    }

    fn apply(&mut self, updates: Vec<ThreadUpdate>) -> StorageResult<Vec<ThreadUpdate>> {
        // Reject the whole batch before touching memory if a target is unknown
        let mut known: HashSet<&str> = HashSet::new();
        for update in &updates {
            match update {
                ThreadUpdate::NewComment(comment) => {
                    known.insert(comment.id.as_str());
                }
                ThreadUpdate::Replies { comment_id, .. } => {
                    if !self.index.contains_key(comment_id) && !known.contains(comment_id.as_str())
                    {
                        return Err(StorageError::CommentNotFound(comment_id.clone()));
                    }
                }
            }
        }

        let mut applied = Vec::with_capacity(updates.len());
        for update in updates {
            match update {
                ThreadUpdate::NewComment(comment) => {
                    if self.index.contains_key(&comment.id) {
                        tracing::warn!("Comment {} is already stored, not appending", comment.id);
                        continue;
                    }
                    let stored = self.push_comment(comment);
                    applied.push(ThreadUpdate::NewComment(stored));
                }
                ThreadUpdate::Replies {
                    comment_id,
                    replies,
                } => {
                    let position = self.position(&comment_id)?;
                    let comment = &mut self.comments[position];
                    let mut kept = Vec::with_capacity(replies.len());
                    for reply in replies {
                        if comment.has_reply(&reply.id) {
                            tracing::warn!(
                                "Reply {} is already stored under comment {}, not appending",
                                reply.id,
                                comment_id
                            );
                            continue;
                        }
                        comment.replies.push(reply.clone());
                        kept.push(reply);
                    }
                    if !kept.is_empty() {
                        applied.push(ThreadUpdate::Replies {
                            comment_id,
                            replies: kept,
                        });
                    }
                }
            }
        }

        if !applied.is_empty() {
            self.persist()?;
        }
        Ok(applied)
    }
}
