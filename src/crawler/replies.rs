//! Reply collection for a single comment
//!
//! Drives one reply stream through the pagination walker and the resume
//! state machine, handing every batch of new replies to a sink.

use crate::crawler::api::{CommentApi, FetchError};
use crate::crawler::pagination::{walk, ReplyPages};
use crate::crawler::rate_limit::RateLimiter;
use crate::credentials::Credential;
use crate::model::Reply;
use crate::state::{ReplyStream, ResumeDrift};
use crate::target::CrawlTarget;
use futures::StreamExt;
use std::convert::Infallible;

/// How a reply stream ended
#[derive(Debug)]
pub enum StreamEnd {
    /// The last page reported no more replies
    Exhausted,
    /// A page fetch failed; replies collected before it are kept
    Failed(FetchError),
    /// The resume boundary never showed up
    Drift(ResumeDrift),
}

/// Summary of one walked reply stream
#[derive(Debug)]
pub struct ReplyWalk {
    pub pages: usize,
    pub collected: usize,
    pub end: StreamEnd,
}

/// Walks the replies of `stream`'s comment, feeding new replies to `sink`
///
/// The sink sees replies in server delivery order, one page at a time. A
/// sink error aborts the walk and is returned as is; fetch failures and
/// drift are reported through [`StreamEnd`] instead.
pub async fn walk_replies<A, F, E>(
    api: &A,
    credential: &Credential,
    target: &CrawlTarget,
    mut stream: ReplyStream,
    limiter: RateLimiter,
    mut sink: F,
) -> Result<ReplyWalk, E>
where
    A: CommentApi + ?Sized,
    F: FnMut(Vec<Reply>) -> Result<(), E>,
{
    let comment_id = stream.comment_id().to_string();
    let source = ReplyPages {
        api,
        credential,
        target,
        comment_id: &comment_id,
    };

    let mut pages = std::pin::pin!(walk(&source, limiter));
    let mut walked = ReplyWalk {
        pages: 0,
        collected: 0,
        end: StreamEnd::Exhausted,
    };

    while let Some(result) = pages.next().await {
        let page = match result {
            Ok(page) => page,
            Err(err) => {
                stream.abandon();
                walked.end = StreamEnd::Failed(err);
                break;
            }
        };
        walked.pages += 1;

        let replies = page.items.into_iter().map(|item| item.into_reply()).collect();
        match stream.accept_page(replies, page.has_more) {
            Ok(fresh) => {
                if !fresh.is_empty() {
                    walked.collected += fresh.len();
                    sink(fresh)?;
                }
            }
            Err(drift) => {
                walked.end = StreamEnd::Drift(drift);
                break;
            }
        }
    }

    tracing::debug!(
        "Comment {}: {} reply pages, {} new replies, stream {}",
        comment_id,
        walked.pages,
        walked.collected,
        stream.state()
    );
    Ok(walked)
}

/// Walks a reply stream and returns everything it collected
pub async fn collect_replies<A>(
    api: &A,
    credential: &Credential,
    target: &CrawlTarget,
    stream: ReplyStream,
    limiter: RateLimiter,
) -> (Vec<Reply>, ReplyWalk)
where
    A: CommentApi + ?Sized,
{
    let mut replies = Vec::new();
    let result = walk_replies(api, credential, target, stream, limiter, |batch| {
        replies.extend(batch);
        Ok::<(), Infallible>(())
    })
    .await;

    match result {
        Ok(walked) => (replies, walked),
        Err(never) => match never {},
    }
}
