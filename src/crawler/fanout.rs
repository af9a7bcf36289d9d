//! Reply fan-out for the concurrent crawl mode
//!
//! For one page of comments, every comment that needs replies gets its own
//! reply-walking task. A semaphore caps how many of those tasks exist at
//! once, and each task holds its own credential lease for its whole stream.
//! The page is only handed back once every task has finished, in the same
//! order the comments were delivered in.

use crate::crawler::api::CommentApi;
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::replies::{collect_replies, ReplyWalk};
use crate::credentials::CredentialPool;
use crate::model::Reply;
use crate::state::ReplyStream;
use crate::target::CrawlTarget;
use crate::HarvestError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One reply stream to walk
#[derive(Debug)]
pub struct ReplyJob {
    /// Position of the comment within its page
    pub position: usize,
    pub stream: ReplyStream,
}

/// Result of one reply job
#[derive(Debug)]
pub struct ReplyOutcome {
    pub position: usize,
    pub comment_id: String,
    /// Pool index of the credential the stream was fetched with
    pub credential_index: usize,
    pub replies: Vec<Reply>,
    pub walk: ReplyWalk,
}

/// Bounded-concurrency scheduler for reply streams
pub struct ReplyFanout<A: ?Sized> {
    api: Arc<A>,
    pool: CredentialPool,
    target: CrawlTarget,
    semaphore: Arc<Semaphore>,
    reply_delay: Duration,
}

impl<A> ReplyFanout<A>
where
    A: CommentApi + ?Sized + 'static,
{
    pub fn new(
        api: Arc<A>,
        pool: CredentialPool,
        target: CrawlTarget,
        max_concurrent: usize,
        reply_delay: Duration,
    ) -> Self {
        Self {
            api,
            pool,
            target,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            reply_delay,
        }
    }

    /// Walks all jobs and returns their outcomes ordered by position
    ///
    /// A failing stream never cancels its siblings; it simply contributes the
    /// replies it gathered before failing.
    pub async fn run(&self, jobs: Vec<ReplyJob>) -> Result<Vec<ReplyOutcome>, HarvestError> {
        let total = jobs.len();
        let mut tasks = JoinSet::new();

        for job in jobs {
            // Waiting here keeps at most `max_concurrent` tasks alive
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| HarvestError::Scheduler("reply semaphore closed".to_string()))?;
            let lease = self.pool.acquire();
            let api = Arc::clone(&self.api);
            let target = self.target.clone();
            let limiter = RateLimiter::new(self.reply_delay);

            tasks.spawn(async move {
                let comment_id = job.stream.comment_id().to_string();
                let (replies, walk) =
                    collect_replies(&*api, lease.credential(), &target, job.stream, limiter)
                        .await;
                drop(permit);
                ReplyOutcome {
                    position: job.position,
                    comment_id,
                    credential_index: lease.index(),
                    replies,
                    walk,
                }
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined?);
        }
        outcomes.sort_by_key(|o| o.position);

        tracing::debug!("Reply fan-out finished {} streams", outcomes.len());
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::api::{FetchError, Page};
    use crate::crawler::pagination::tests::{page, status_error};
    use crate::crawler::replies::StreamEnd;
    use crate::credentials::Credential;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Reply-only API; tracks how many reply requests are in flight at once
    struct SlowReplies {
        pages: HashMap<(String, u64), Result<Page, u16>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        cookies_seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommentApi for SlowReplies {
        async fn list_comments(
            &self,
            _credential: &Credential,
            _target: &CrawlTarget,
            _cursor: u64,
        ) -> Result<Page, FetchError> {
            Err(status_error(404))
        }

        async fn list_replies(
            &self,
            credential: &Credential,
            _target: &CrawlTarget,
            comment_id: &str,
            cursor: u64,
        ) -> Result<Page, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.cookies_seen
                .lock()
                .unwrap()
                .push(credential.cookie_header());
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.pages.get(&(comment_id.to_string(), cursor)) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(status)) => Err(status_error(*status)),
                None => Ok(Page::default()),
            }
        }
    }

    fn pool(n: usize) -> CredentialPool {
        CredentialPool::new(
            (0..n)
                .map(|i| Credential::new(format!("c{}", i), vec![("sid".into(), i.to_string())]))
                .collect(),
        )
        .unwrap()
    }

    fn fanout(api: SlowReplies, credentials: usize, max: usize) -> ReplyFanout<SlowReplies> {
        ReplyFanout::new(
            Arc::new(api),
            pool(credentials),
            CrawlTarget::from_url("42").unwrap(),
            max,
            Duration::ZERO,
        )
    }

    fn jobs(ids: &[&str]) -> Vec<ReplyJob> {
        ids.iter()
            .enumerate()
            .map(|(position, id)| ReplyJob {
                position,
                stream: ReplyStream::new(*id),
            })
            .collect()
    }

    fn api(pages: Vec<((&str, u64), Result<Page, u16>)>) -> SlowReplies {
        SlowReplies {
            pages: pages
                .into_iter()
                .map(|((id, cursor), page)| ((id.to_string(), cursor), page))
                .collect(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            cookies_seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_outcomes_in_page_order() {
        let scheduler = fanout(
            api(vec![
                (("a", 0), Ok(page(&["a1", "a2"], 2, false))),
                (("b", 0), Ok(page(&["b1"], 1, false))),
                (("c", 0), Ok(page(&[], 0, false))),
            ]),
            3,
            3,
        );

        let outcomes = scheduler.run(jobs(&["a", "b", "c"])).await.unwrap();
        let ids: Vec<&str> = outcomes.iter().map(|o| o.comment_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(outcomes[0].replies.len(), 2);
        assert_eq!(outcomes[1].replies.len(), 1);
        assert!(outcomes[2].replies.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let scheduler = fanout(api(vec![]), 4, 2);
        let outcomes = scheduler
            .run(jobs(&["a", "b", "c", "d", "e", "f"]))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 6);
        let peak = scheduler.api.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_simultaneous_streams_use_distinct_credentials() {
        let scheduler = fanout(api(vec![]), 3, 3);
        let outcomes = scheduler.run(jobs(&["a", "b", "c"])).await.unwrap();

        let mut used: Vec<usize> = outcomes.iter().map(|o| o.credential_index).collect();
        used.sort_unstable();
        assert_eq!(used, vec![0, 1, 2]);

        let mut cookies = scheduler.api.cookies_seen.lock().unwrap().clone();
        cookies.sort();
        assert_eq!(cookies, vec!["sid=0", "sid=1", "sid=2"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let scheduler = fanout(
            api(vec![
                (("a", 0), Ok(page(&["a1"], 1, true))),
                (("a", 1), Err(500)),
                (("b", 0), Ok(page(&["b1", "b2"], 2, false))),
            ]),
            2,
            2,
        );

        let outcomes = scheduler.run(jobs(&["a", "b"])).await.unwrap();
        assert_eq!(outcomes[0].replies.len(), 1);
        assert!(matches!(outcomes[0].walk.end, StreamEnd::Failed(_)));
        assert_eq!(outcomes[1].replies.len(), 2);
        assert!(matches!(outcomes[1].walk.end, StreamEnd::Exhausted));
    }
}
