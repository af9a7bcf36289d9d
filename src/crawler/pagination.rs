//! Cursor-driven pagination
//!
//! [`walk`] turns any [`PageSource`] into a lazy stream of pages. The same
//! walker drives the comment stream and every reply stream.
//!
//! # Termination
//!
//! | Condition                              | Stream behaviour                 |
//! |----------------------------------------|----------------------------------|
//! | page with `has_more == false`          | page yielded, stream ends        |
//! | fetch error (transport/status/decode)  | error yielded, stream ends       |
//! | `has_more` but cursor did not advance  | page yielded, then `StalledCursor` |
//! | empty page with `has_more == true`     | cursor advanced, walk continues  |
//!
//! Nothing is retried. Callers treat the pages yielded before an error as
//! valid partial results.

use crate::crawler::api::{CommentApi, FetchError, Page};
use crate::crawler::rate_limit::RateLimiter;
use crate::credentials::Credential;
use crate::target::CrawlTarget;
use async_trait::async_trait;
use futures::stream::{self, Stream};

/// Something that can fetch the page at a cursor
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, cursor: u64) -> Result<Page, FetchError>;

    /// Name of the stream, for errors raised by the walker itself
    fn describe(&self, cursor: u64) -> String;
}

/// The top-level comment stream of a target
pub struct CommentPages<'a, A: ?Sized> {
    pub api: &'a A,
    pub credential: &'a Credential,
    pub target: &'a CrawlTarget,
}

#[async_trait]
impl<A: CommentApi + ?Sized> PageSource for CommentPages<'_, A> {
    async fn fetch_page(&self, cursor: u64) -> Result<Page, FetchError> {
        self.api
            .list_comments(self.credential, self.target, cursor)
            .await
    }

    fn describe(&self, cursor: u64) -> String {
        format!("comment list (cursor {})", cursor)
    }
}

/// The reply stream under one comment
pub struct ReplyPages<'a, A: ?Sized> {
    pub api: &'a A,
    pub credential: &'a Credential,
    pub target: &'a CrawlTarget,
    pub comment_id: &'a str,
}

#[async_trait]
impl<A: CommentApi + ?Sized> PageSource for ReplyPages<'_, A> {
    async fn fetch_page(&self, cursor: u64) -> Result<Page, FetchError> {
        self.api
            .list_replies(self.credential, self.target, self.comment_id, cursor)
            .await
    }

    fn describe(&self, cursor: u64) -> String {
        format!("reply list of comment {} (cursor {})", self.comment_id, cursor)
    }
}

enum WalkState {
    Next(u64),
    Failed(FetchError),
    Done,
}

/// Walks a stream from cursor 0
pub fn walk<'a, S>(
    source: &'a S,
    limiter: RateLimiter,
) -> impl Stream<Item = Result<Page, FetchError>> + Send + 'a
where
    S: PageSource + ?Sized,
{
    walk_from(source, 0, limiter)
}

/// Walks a stream starting at `initial_cursor`
///
/// The limiter is consulted before every fetch, so consecutive requests of
/// this stream are spaced by its delay.
pub fn walk_from<'a, S>(
    source: &'a S,
    initial_cursor: u64,
    limiter: RateLimiter,
) -> impl Stream<Item = Result<Page, FetchError>> + Send + 'a
where
    S: PageSource + ?Sized,
{
    stream::unfold(
        (WalkState::Next(initial_cursor), limiter),
        move |(state, mut limiter)| async move {
            let cursor = match state {
                WalkState::Done => return None,
                WalkState::Failed(err) => return Some((Err(err), (WalkState::Done, limiter))),
                WalkState::Next(cursor) => cursor,
            };

            limiter.until_ready().await;
            match source.fetch_page(cursor).await {
                Ok(page) => {
                    let next = if !page.has_more {
                        WalkState::Done
                    } else if page.cursor <= cursor {
                        WalkState::Failed(FetchError::StalledCursor {
                            endpoint: source.describe(cursor),
                            cursor,
                        })
                    } else {
                        if page.items.is_empty() {
                            tracing::debug!(
                                "{}: empty page with more to come, advancing to {}",
                                source.describe(cursor),
                                page.cursor
                            );
                        }
                        WalkState::Next(page.cursor)
                    };
                    Some((Ok(page), (next, limiter)))
                }
                Err(err) => Some((Err(err), (WalkState::Done, limiter))),
            }
        },
    )
}
