//! Statistics over a persisted comment document
//!
//! This module provides functionality for summarising what a document holds
//! and where the next run would resume.

use crate::model::display_time;
use crate::state::ResumePoint;
use crate::storage::CommentStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Document statistics summary
#[derive(Debug, Clone)]
pub struct DocumentStatistics {
    /// Number of top-level comments
    pub total_comments: usize,

    /// Number of replies across all comments
    pub total_replies: usize,

    /// Comments holding at least one reply
    pub comments_with_replies: usize,

    /// Comment with the longest reply list, with its reply count
    pub busiest_comment: Option<(String, usize)>,

    /// Distinct named authors of comments and replies
    pub unique_authors: usize,

    /// Oldest and newest timestamps of any item
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,

    /// Where the next run would continue
    pub resume: ResumePoint,
}

/// Loads statistics from a comment store
///
/// # Arguments
///
/// * `store` - The store to summarise
pub fn load_statistics(store: &dyn CommentStore) -> DocumentStatistics {
    let comments = store.comments();

    let mut authors = HashSet::new();
    let mut earliest: Option<DateTime<Utc>> = None;
    let mut latest: Option<DateTime<Utc>> = None;
    let mut busiest: Option<(String, usize)> = None;

    let mut observe = |author: &Option<String>, at: DateTime<Utc>| {
        if let Some(name) = author.as_deref().filter(|n| !n.is_empty()) {
            authors.insert(name.to_string());
        }
        earliest = Some(earliest.map_or(at, |e| e.min(at)));
        latest = Some(latest.map_or(at, |l| l.max(at)));
    };

    for comment in comments {
        observe(&comment.author, comment.created_at);
        for reply in &comment.replies {
            observe(&reply.author, reply.created_at);
        }

        let count = comment.replies.len();
        if count > 0 && busiest.as_ref().map_or(true, |(_, max)| count > *max) {
            busiest = Some((comment.id.clone(), count));
        }
    }

    DocumentStatistics {
        total_comments: comments.len(),
        total_replies: store.reply_count(),
        comments_with_replies: comments.iter().filter(|c| !c.replies.is_empty()).count(),
        busiest_comment: busiest,
        unique_authors: authors.len(),
        earliest,
        latest,
        resume: ResumePoint::resolve(comments),
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DocumentStatistics) {
    println!("=== Document Statistics ===\n");

    println!("Overview:");
    println!("  Comments: {}", stats.total_comments);
    println!("  Replies: {}", stats.total_replies);
    println!(
        "  Comments with replies: {}",
        stats.comments_with_replies
    );
    println!("  Unique authors: {}", stats.unique_authors);
    if let Some((id, count)) = &stats.busiest_comment {
        println!("  Most replies: {} (comment {})", count, id);
    }
    println!();

    if let (Some(earliest), Some(latest)) = (&stats.earliest, &stats.latest) {
        println!("Time Span:");
        println!("  Earliest: {}", display_time(earliest));
        println!("  Latest: {}", display_time(latest));
        println!();
    }

    println!("Resume Point:");
    match (&stats.resume.last_comment_id, &stats.resume.last_reply_id) {
        (None, _) => println!("  (empty document, next run starts from the beginning)"),
        (Some(comment), None) => println!("  After comment {} (no replies stored)", comment),
        (Some(comment), Some(reply)) => {
            println!("  After reply {} of comment {}", reply, comment)
        }
    }
}
