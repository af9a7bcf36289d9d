//! State module for tracking crawl progress
//!
//! All resume state is derived from the persisted document at startup.
//!
//! # Components
//!
//! - `ResumePoint`: the last stored comment and reply, read off the document tail
//! - `ProcessedComments`: which comments of a page still need work
//! - `ReplyStream`: per-comment state machine that skips already stored replies

mod processed;
mod reply_stream;
mod resume;

// Re-export main types
pub use processed::ProcessedComments;
pub use reply_stream::{ReplyStream, ReplyStreamState, ResumeDrift};
pub use resume::ResumePoint;
