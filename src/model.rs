//! Persisted comment tree types
//!
//! A document is an ordered list of [`Comment`]s, each carrying its replies in
//! the order the server delivered them.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used in operator-facing output
pub const DISPLAY_TIME_FORMAT: &str = "%Y:%m:%d-%H:%M";

/// A top-level comment and the replies harvested for it so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Append order, which is server delivery order
    #[serde(default)]
    pub replies: Vec<Reply>,
}

/// A reply nested under a [`Comment`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub author: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Id of the last stored reply, if any
    pub fn last_reply_id(&self) -> Option<&str> {
        self.replies.last().map(|r| r.id.as_str())
    }

    pub fn has_reply(&self, reply_id: &str) -> bool {
        self.replies.iter().any(|r| r.id == reply_id)
    }
}

/// Formats a timestamp for console output in local time
pub fn display_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(DISPLAY_TIME_FORMAT).to_string()
}
