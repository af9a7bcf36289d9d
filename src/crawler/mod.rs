//! Crawler module for harvesting comment threads
//!
//! This module contains the core crawling logic, including:
//! - The upstream comment API client
//! - Cursor pagination shared by the comment and reply streams
//! - Per-stream rate limiting
//! - Reply collection, sequential or fanned out across credentials
//! - Overall crawl coordination

mod api;
mod coordinator;
mod fanout;
mod pagination;
mod rate_limit;
mod replies;

pub use api::{build_http_client, ApiAuthor, ApiItem, CommentApi, FetchError, HttpApi, Page};
pub use coordinator::{run_crawl, Coordinator, CrawlReport, CrawlStatus};
pub use fanout::{ReplyFanout, ReplyJob, ReplyOutcome};
pub use pagination::{walk, walk_from, CommentPages, PageSource, ReplyPages};
pub use rate_limit::RateLimiter;
pub use replies::{collect_replies, walk_replies, ReplyWalk, StreamEnd};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Derive the crawl target and load the credential pool
/// 2. Open the comment document, resuming from its tail unless `fresh`
/// 3. Walk the comment stream and collect replies
/// 4. Persist every change as it is made
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `fresh` - Ignore the existing document
/// * `console` - Print one progress line per stored item
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The crawl ran; check its status for interruptions
/// * `Err(HarvestError)` - Setup failed or resume drift was detected
pub async fn crawl(config: Config, fresh: bool, console: bool) -> Result<CrawlReport, HarvestError> {
    run_crawl(config, fresh, console).await
}
