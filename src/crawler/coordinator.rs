//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! a harvest, including:
//! - Resolving the resume point from the stored document
//! - Walking the comment stream and skipping comments already handled
//! - Collecting replies, one stream at a time or fanned out per page
//! - Persisting every change through the single comment store
//!
//! The coordinator is the only writer to the store. In concurrent mode,
//! reply tasks return what they collected and the coordinator merges a whole
//! comment page with one write once every task of that page has finished.

use crate::config::{Config, CrawlMode, CrawlerConfig};
use crate::crawler::api::{ApiItem, CommentApi, HttpApi};
use crate::crawler::fanout::{ReplyFanout, ReplyJob};
use crate::crawler::pagination::{walk, CommentPages};
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::replies::{walk_replies, StreamEnd};
use crate::credentials::{load_credentials, CredentialPool};
use crate::model::Comment;
use crate::output::ConsoleReporter;
use crate::state::{ProcessedComments, ReplyStream, ResumePoint};
use crate::storage::{open_store, CommentStore, StorageError, ThreadUpdate};
use crate::target::CrawlTarget;
use crate::HarvestError;
use futures::StreamExt;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a crawl ended
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CrawlStatus {
    /// The comment stream was walked to its end
    #[default]
    Completed,
    /// A comment page could not be fetched; everything before it is stored
    Interrupted { reason: String },
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Interrupted { reason } => write!(f, "interrupted ({})", reason),
        }
    }
}

/// Summary of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub comments_added: usize,
    pub replies_added: usize,
    pub comment_pages: usize,
    pub reply_pages: usize,
    /// Reply streams that ended on a failed fetch
    pub partial_reply_streams: usize,
    pub status: CrawlStatus,
}

impl CrawlReport {
    pub fn is_complete(&self) -> bool {
        self.status == CrawlStatus::Completed
    }
}

/// A comment of the current page that still needs work
struct PendingComment {
    comment: Comment,
    /// Already stored; only its missing replies are collected
    boundary: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator<A: ?Sized, S> {
    api: Arc<A>,
    store: S,
    pool: CredentialPool,
    target: CrawlTarget,
    settings: CrawlerConfig,
    reporter: ConsoleReporter,
}

impl<A, S> Coordinator<A, S>
where
    A: CommentApi + ?Sized + 'static,
    S: CommentStore,
{
    pub fn new(
        api: Arc<A>,
        store: S,
        pool: CredentialPool,
        target: CrawlTarget,
        settings: CrawlerConfig,
        reporter: ConsoleReporter,
    ) -> Self {
        Self {
            api,
            store,
            pool,
            target,
            settings,
            reporter,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Runs the crawl until the comment stream ends or fails
    ///
    /// A failing comment page ends the run with an `Interrupted` report.
    /// Resume drift on the boundary comment is returned as an error before
    /// anything of that page is stored.
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let resume = ResumePoint::resolve(self.store.comments());
        let mut processed = ProcessedComments::new(self.store.comments(), &resume);

        match (&resume.last_comment_id, &resume.last_reply_id) {
            (None, _) => tracing::info!("Starting crawl of target {}", self.target),
            (Some(comment), reply) => tracing::info!(
                "Resuming crawl of target {} after comment {} (last reply: {}), {} comments stored",
                self.target,
                comment,
                reply.as_deref().unwrap_or("none"),
                processed.initial_len()
            ),
        }

        let mut report = CrawlReport::default();
        let start_time = Instant::now();

        let api = Arc::clone(&self.api);
        let target = self.target.clone();
        let lease = self.pool.acquire();
        let source = CommentPages {
            api: &*api,
            credential: lease.credential(),
            target: &target,
        };
        let limiter = RateLimiter::from_millis(self.settings.comment_page_delay_ms);
        let mut pages = std::pin::pin!(walk(&source, limiter));

        let fanout = ReplyFanout::new(
            Arc::clone(&self.api),
            self.pool.clone(),
            self.target.clone(),
            self.settings.max_concurrent_replies as usize,
            self.reply_delay(),
        );

        while let Some(result) = pages.next().await {
            let page = match result {
                Ok(page) => page,
                Err(err) => {
                    tracing::error!("Comment stream ended early: {}", err);
                    self.reporter.failure(&err);
                    report.status = CrawlStatus::Interrupted {
                        reason: err.to_string(),
                    };
                    break;
                }
            };
            report.comment_pages += 1;

            let pending = self.pending_comments(page.items, &processed);
            tracing::debug!(
                "Comment page {}: {} comments need work, cursor {}",
                report.comment_pages,
                pending.len(),
                page.cursor
            );

            match self.settings.mode {
                CrawlMode::Sequential => {
                    self.process_sequential(pending, &resume, &mut processed, &mut report)
                        .await?
                }
                CrawlMode::Concurrent => {
                    self.process_concurrent(&fanout, pending, &resume, &mut processed, &mut report)
                        .await?
                }
            }
        }

        tracing::info!(
            "Crawl {} in {:.1}s: {} comments and {} replies added over {} comment pages, {} partial reply streams",
            report.status,
            start_time.elapsed().as_secs_f64(),
            report.comments_added,
            report.replies_added,
            report.comment_pages,
            report.partial_reply_streams
        );
        Ok(report)
    }

    fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.settings.reply_page_delay_ms)
    }

    /// Filters a page down to the comments that are new or the boundary
    fn pending_comments(
        &self,
        items: Vec<ApiItem>,
        processed: &ProcessedComments,
    ) -> Vec<PendingComment> {
        let mut seen = HashSet::new();
        items
            .into_iter()
            .map(ApiItem::into_comment)
            .filter(|comment| !processed.should_skip(&comment.id))
            .filter(|comment| seen.insert(comment.id.clone()))
            .map(|comment| PendingComment {
                boundary: processed.is_boundary(&comment.id),
                comment,
            })
            .collect()
    }

    fn reply_stream(&self, pending: &PendingComment, resume: &ResumePoint) -> ReplyStream {
        if pending.boundary {
            ReplyStream::resuming(
                pending.comment.id.clone(),
                resume.last_reply_id.clone(),
                self.settings.max_resume_skip,
            )
        } else {
            ReplyStream::new(pending.comment.id.clone())
        }
    }

    fn stored_reply_count(&self, comment_id: &str) -> usize {
        self.store
            .comments()
            .iter()
            .find(|c| c.id == comment_id)
            .map_or(0, |c| c.replies.len())
    }

    /// One comment at a time, persisting every item as it arrives
    async fn process_sequential(
        &mut self,
        pending: Vec<PendingComment>,
        resume: &ResumePoint,
        processed: &mut ProcessedComments,
        report: &mut CrawlReport,
    ) -> Result<(), HarvestError> {
        let api = Arc::clone(&self.api);
        let target = self.target.clone();
        let delay = self.reply_delay();

        for entry in pending {
            let comment_id = entry.comment.id.clone();
            let stream = self.reply_stream(&entry, resume);

            if entry.boundary {
                let stored = self.stored_reply_count(&comment_id);
                self.reporter.continue_comment(stored);
            } else if self.store.append_comment(entry.comment.clone())? {
                report.comments_added += 1;
                self.reporter.comment(&entry.comment);
            }

            let lease = self.pool.acquire();
            let store = &mut self.store;
            let reporter = &mut self.reporter;
            let mut added = 0;
            let walked = walk_replies(
                &*api,
                lease.credential(),
                &target,
                stream,
                RateLimiter::new(delay),
                |batch| {
                    for reply in batch {
                        if store.append_reply(&comment_id, reply.clone())? {
                            added += 1;
                            reporter.reply(&reply);
                        }
                    }
                    Ok::<(), StorageError>(())
                },
            )
            .await?;

            report.reply_pages += walked.pages;
            report.replies_added += added;
            match walked.end {
                StreamEnd::Exhausted => {}
                StreamEnd::Failed(err) => {
                    self.note_partial_stream(&comment_id, &err, report);
                }
                StreamEnd::Drift(drift) => {
                    tracing::error!("{}", drift);
                    return Err(drift.into());
                }
            }

            processed.mark_completed(&comment_id);
        }

        Ok(())
    }

    /// Fans the reply streams of one page out, then merges with one write
    async fn process_concurrent(
        &mut self,
        fanout: &ReplyFanout<A>,
        pending: Vec<PendingComment>,
        resume: &ResumePoint,
        processed: &mut ProcessedComments,
        report: &mut CrawlReport,
    ) -> Result<(), HarvestError> {
        if pending.is_empty() {
            return Ok(());
        }

        let jobs = pending
            .iter()
            .enumerate()
            .map(|(position, entry)| ReplyJob {
                position,
                stream: self.reply_stream(entry, resume),
            })
            .collect();
        let outcomes = fanout.run(jobs).await?;

        let mut updates = Vec::with_capacity(outcomes.len());
        for (entry, outcome) in pending.into_iter().zip(outcomes) {
            report.reply_pages += outcome.walk.pages;
            match outcome.walk.end {
                StreamEnd::Exhausted => {}
                StreamEnd::Failed(err) => {
                    self.note_partial_stream(&outcome.comment_id, &err, report);
                }
                StreamEnd::Drift(drift) => {
                    tracing::error!("{}", drift);
                    return Err(drift.into());
                }
            }

            if entry.boundary {
                updates.push(ThreadUpdate::Replies {
                    comment_id: outcome.comment_id,
                    replies: outcome.replies,
                });
            } else {
                updates.push(ThreadUpdate::NewComment(Comment {
                    replies: outcome.replies,
                    ..entry.comment
                }));
            }
        }

        let completed: Vec<String> = updates
            .iter()
            .map(|update| match update {
                ThreadUpdate::NewComment(comment) => comment.id.clone(),
                ThreadUpdate::Replies { comment_id, .. } => comment_id.clone(),
            })
            .collect();

        let applied = self.store.apply(updates)?;
        for update in &applied {
            match update {
                ThreadUpdate::NewComment(comment) => {
                    report.comments_added += 1;
                    report.replies_added += comment.replies.len();
                    self.reporter.comment(comment);
                    for reply in &comment.replies {
                        self.reporter.reply(reply);
                    }
                }
                ThreadUpdate::Replies {
                    comment_id,
                    replies,
                } => {
                    report.replies_added += replies.len();
                    let stored = self.stored_reply_count(comment_id);
                    self.reporter
                        .continue_comment(stored.saturating_sub(replies.len()));
                    for reply in replies {
                        self.reporter.reply(reply);
                    }
                }
            }
        }

        for id in &completed {
            processed.mark_completed(id);
        }
        Ok(())
    }

    fn note_partial_stream(
        &mut self,
        comment_id: &str,
        err: &crate::crawler::FetchError,
        report: &mut CrawlReport,
    ) {
        tracing::warn!(
            "Replies of comment {} are incomplete: {}",
            comment_id,
            err
        );
        self.reporter.failure(err);
        report.partial_reply_streams += 1;
    }
}

/// Builds every component from a configuration and runs one crawl
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `fresh` - Start from an empty document instead of resuming
/// * `console` - Print a progress line per stored item
pub async fn run_crawl(
    config: Config,
    fresh: bool,
    console: bool,
) -> Result<CrawlReport, HarvestError> {
    let target = CrawlTarget::from_url(&config.target.url)?;
    let credentials = load_credentials(&config.credentials.files)?;
    let pool = CredentialPool::new(credentials)?;
    tracing::info!("Loaded {} credentials", pool.len());

    let api = HttpApi::new(
        &config.api,
        config.crawler.comment_page_size,
        config.crawler.reply_page_size,
    )?;
    let store = open_store(Path::new(&config.output.document_path), fresh)?;
    let reporter = ConsoleReporter::seeded(store.comments(), console);

    let mut coordinator = Coordinator::new(
        Arc::new(api),
        store,
        pool,
        target,
        config.crawler,
        reporter,
    );
    coordinator.run().await
}
