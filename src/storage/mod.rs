//! Storage module for persisting harvested comments
//!
//! This module owns the on-disk comment document:
//! - Loading a previous run's output for resumption
//! - Append-only mutation of comments and replies
//! - Crash-safe rewrites (temp file + atomic rename)

mod json_file;
mod traits;

pub use json_file::JsonFileStore;
pub use traits::{CommentStore, StorageError, StorageResult, ThreadUpdate};

use crate::HarvestError;
use std::path::Path;

/// Opens the comment document for a run
///
/// # Arguments
///
/// * `path` - Path to the JSON document
/// * `fresh` - Start from an empty document instead of resuming
///
/// # Returns
///
/// * `Ok(JsonFileStore)` - Store ready for appending
/// * `Err(HarvestError)` - The existing document could not be read
pub fn open_store(path: &Path, fresh: bool) -> Result<JsonFileStore, HarvestError> {
    if fresh {
        if path.exists() {
            tracing::warn!(
                "Fresh run requested; {} will be overwritten on the first write",
                path.display()
            );
        }
        return Ok(JsonFileStore::fresh(path));
    }
    Ok(JsonFileStore::open(path)?)
}
