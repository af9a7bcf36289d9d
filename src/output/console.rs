//! Operator console progress lines
//!
//! Every comment or reply that reaches the document gets one line on stdout.
//! Lines carry a global sequence number that continues from the items
//! already stored, so numbering stays stable across resumed runs.

use crate::model::{display_time, Comment, Reply};

/// Prints one line per persisted item
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    enabled: bool,
    /// Items in the document, comments and replies alike
    total: usize,
    /// Comments in the document
    comments: usize,
    /// Replies stored under the comment currently being reported
    replies: usize,
}

impl ConsoleReporter {
    /// Creates a reporter for an empty document
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            total: 0,
            comments: 0,
            replies: 0,
        }
    }

    /// Creates a reporter whose counters continue from `comments`
    pub fn seeded(comments: &[Comment], enabled: bool) -> Self {
        let total = comments.iter().map(|c| 1 + c.replies.len()).sum();
        Self {
            enabled,
            total,
            comments: comments.len(),
            replies: comments.last().map_or(0, |c| c.replies.len()),
        }
    }

    /// Number of items reported or seeded so far
    pub fn total(&self) -> usize {
        self.total
    }

    /// Reports a newly stored comment and resets the reply counter
    pub fn comment(&mut self, comment: &Comment) {
        self.total += 1;
        self.comments += 1;
        self.replies = 0;
        let line = self.comment_line(comment);
        self.emit(line);
    }

    /// Switches reply numbering to an already stored comment
    pub fn continue_comment(&mut self, stored_replies: usize) {
        self.replies = stored_replies;
    }

    /// Reports a newly stored reply of the current comment
    pub fn reply(&mut self, reply: &Reply) {
        self.total += 1;
        self.replies += 1;
        let line = self.reply_line(reply);
        self.emit(line);
    }

    /// Reports a failed call; the error names the endpoint
    pub fn failure(&self, err: &dyn std::fmt::Display) {
        if self.enabled {
            println!("[!] {}", err);
        }
    }

    fn comment_line(&self, comment: &Comment) -> String {
        format!(
            "[#{}] Comment {}: {} | {} {} | ID: {}",
            self.total,
            self.comments,
            comment.text,
            author_name(comment.author.as_deref()),
            display_time(&comment.created_at),
            comment.id
        )
    }

    fn reply_line(&self, reply: &Reply) -> String {
        format!(
            "[#{}]     Reply {}: {} | {} {} | ID: {}",
            self.total,
            self.replies,
            reply.text,
            author_name(reply.author.as_deref()),
            display_time(&reply.created_at),
            reply.id
        )
    }

    fn emit(&self, line: String) {
        if self.enabled {
            println!("{}", line);
        }
    }
}

fn author_name(author: Option<&str>) -> &str {
    match author {
        Some(name) if !name.is_empty() => name,
        _ => "(unknown)",
    }
}
