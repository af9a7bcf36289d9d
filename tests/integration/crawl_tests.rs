//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the comment API and run the full
//! harvest cycle end-to-end: config parsing, credential loading, HTTP
//! requests, pagination, resume, and the on-disk document.

use comment_harvester::config::{parse_config, Config, CrawlMode};
use comment_harvester::crawler::{crawl, CrawlStatus};
use comment_harvester::storage::{CommentStore, JsonFileStore};
use comment_harvester::{Comment, HarvestError};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMMENT_PATH: &str = "/api/comment/list/";
const REPLY_PATH: &str = "/api/comment/list/reply/";
const TARGET: &str = "7491129701956652306";

const MODES: [CrawlMode; 2] = [CrawlMode::Sequential, CrawlMode::Concurrent];

/// One API item, in the service's own field names
fn item(id: &str) -> Value {
    json!({
        "cid": id,
        "text": format!("text of {}", id),
        "create_time": 1_700_000_000,
        "user": { "nickname": format!("user-{}", id) }
    })
}

fn page_body(ids: &[&str], cursor: u64, has_more: bool) -> Value {
    json!({
        "comments": ids.iter().map(|id| item(id)).collect::<Vec<_>>(),
        "cursor": cursor,
        "has_more": if has_more { 1 } else { 0 }
    })
}

async fn mount_comments(server: &MockServer, cursor: u64, body: Value) {
    Mock::given(method("GET"))
        .and(path(COMMENT_PATH))
        .and(query_param("aweme_id", TARGET))
        .and(query_param("cursor", cursor.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_replies(server: &MockServer, comment: &str, cursor: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(REPLY_PATH))
        .and(query_param("comment_id", comment))
        .and(query_param("item_id", TARGET))
        .and(query_param("cursor", cursor.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Test workspace: a credential file and a document path in a temp dir
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("cookies.json"),
            r#"[{"name": "sessionid", "value": "abc123", "domain": ".example.com"}]"#,
        )
        .unwrap();
        Self { dir }
    }

    fn document(&self) -> PathBuf {
        self.dir.path().join("comments.json")
    }

    fn config(&self, server: &MockServer, mode: CrawlMode) -> Config {
        let toml = format!(
            r#"
[crawler]
mode = "{mode}"
max-concurrent-replies = 3
comment-page-delay-ms = 0
reply-page-delay-ms = 0

[api]
base-url = "{base}"
comment-path = "{comment_path}"
reply-path = "{reply_path}"

[api.query]
aid = "1988"

[target]
url = "{base}/@someone/video/{target}"

[credentials]
files = ["{cookies}"]

[output]
document-path = "{document}"
"#,
            mode = mode,
            base = server.uri(),
            comment_path = COMMENT_PATH,
            reply_path = REPLY_PATH,
            target = TARGET,
            cookies = self.dir.path().join("cookies.json").display(),
            document = self.document().display(),
        );
        parse_config(&toml).unwrap()
    }

    fn stored(&self) -> Vec<Comment> {
        JsonFileStore::open(&self.document())
            .unwrap()
            .comments()
            .to_vec()
    }

    fn seed(&self, comments: Vec<Comment>) {
        let mut store = JsonFileStore::fresh(&self.document());
        for comment in comments {
            store.append_comment(comment).unwrap();
        }
    }
}

/// A comment as an earlier run would have stored it from `item`
fn stored_comment(id: &str, replies: &[&str]) -> Comment {
    let entry = |id: &str| {
        json!({
            "id": id,
            "author": format!("user-{}", id),
            "text": format!("text of {}", id),
            "created_at": "2023-11-14T22:13:20Z"
        })
    };
    let mut comment = entry(id);
    comment["replies"] = Value::Array(replies.iter().map(|r| entry(r)).collect());
    serde_json::from_value(comment).unwrap()
}

fn ids(comments: &[Comment]) -> Vec<&str> {
    comments.iter().map(|c| c.id.as_str()).collect()
}

fn reply_ids(comment: &Comment) -> Vec<&str> {
    comment.replies.iter().map(|r| r.id.as_str()).collect()
}

fn document_at(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_two_comments_without_replies() {
    for mode in MODES {
        let server = MockServer::start().await;
        mount_comments(&server, 0, page_body(&["c1", "c2"], 2, false)).await;
        mount_replies(&server, "c1", 0, ok(page_body(&[], 0, false))).await;
        mount_replies(&server, "c2", 0, ok(json!({ "comments": null, "cursor": 0, "has_more": false }))).await;

        let ws = Workspace::new();
        let report = crawl(ws.config(&server, mode), false, false).await.unwrap();

        assert_eq!(report.status, CrawlStatus::Completed, "{}", mode);
        assert_eq!(report.comments_added, 2);
        assert_eq!(report.replies_added, 0);

        let stored = ws.stored();
        assert_eq!(ids(&stored), vec!["c1", "c2"]);
        assert!(stored.iter().all(|c| c.replies.is_empty()));
        assert_eq!(stored[0].author.as_deref(), Some("user-c1"));
        assert_eq!(stored[0].text, "text of c1");
    }
}

#[tokio::test]
async fn test_document_is_a_json_array_of_comments() {
    let server = MockServer::start().await;
    mount_comments(&server, 0, page_body(&["c1"], 1, false)).await;
    mount_replies(&server, "c1", 0, ok(page_body(&["r1"], 1, false))).await;

    let ws = Workspace::new();
    crawl(ws.config(&server, CrawlMode::Sequential), false, false)
        .await
        .unwrap();

    let document = document_at(&ws.document());
    let comments = document.as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["id"], "c1");
    assert_eq!(comments[0]["replies"][0]["id"], "r1");
    assert_eq!(comments[0]["replies"][0]["author"], "user-r1");
}

#[tokio::test]
async fn test_credentials_and_static_query_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(COMMENT_PATH))
        .and(query_param("aid", "1988"))
        .and(query_param("count", "20"))
        .and(header("cookie", "sessionid=abc123"))
        .respond_with(ok(page_body(&[], 0, false)))
        .expect(1)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let report = crawl(ws.config(&server, CrawlMode::Concurrent), false, false)
        .await
        .unwrap();
    assert_eq!(report.status, CrawlStatus::Completed);
    assert!(ws.stored().is_empty());
}

#[tokio::test]
async fn test_final_first_page_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(COMMENT_PATH))
        .respond_with(ok(page_body(&["c1"], 1, false)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(REPLY_PATH))
        .respond_with(ok(page_body(&[], 0, false)))
        .expect(1)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let report = crawl(ws.config(&server, CrawlMode::Sequential), false, false)
        .await
        .unwrap();
    assert_eq!(report.comment_pages, 1);
    assert_eq!(report.reply_pages, 1);
}

#[tokio::test]
async fn test_resume_inside_reply_list() {
    for mode in MODES {
        let server = MockServer::start().await;
        mount_comments(&server, 0, page_body(&["c1"], 1, false)).await;
        mount_replies(&server, "c1", 0, ok(page_body(&["r1", "r2", "r3"], 3, true))).await;
        mount_replies(&server, "c1", 3, ok(page_body(&["r4", "r5"], 5, false))).await;

        // A previous run stored c1 with its first two replies
        let ws = Workspace::new();
        ws.seed(vec![stored_comment("c1", &["r1", "r2"])]);

        let report = crawl(ws.config(&server, mode), false, false).await.unwrap();
        assert_eq!(report.comments_added, 0, "{}", mode);
        assert_eq!(report.replies_added, 3);

        let stored = ws.stored();
        assert_eq!(ids(&stored), vec!["c1"]);
        assert_eq!(reply_ids(&stored[0]), vec!["r1", "r2", "r3", "r4", "r5"]);
    }
}

#[tokio::test]
async fn test_failed_reply_page_keeps_earlier_replies() {
    for mode in MODES {
        let server = MockServer::start().await;
        mount_comments(&server, 0, page_body(&["c1", "c2"], 2, false)).await;
        mount_replies(&server, "c1", 0, ok(page_body(&["r1", "r2"], 2, true))).await;
        mount_replies(&server, "c1", 2, ResponseTemplate::new(500).set_body_string("boom")).await;
        mount_replies(&server, "c1", 4, ok(page_body(&["r5"], 5, false))).await;
        mount_replies(&server, "c2", 0, ok(page_body(&["r9"], 1, false))).await;

        let ws = Workspace::new();
        let report = crawl(ws.config(&server, mode), false, false).await.unwrap();

        assert_eq!(report.status, CrawlStatus::Completed, "{}", mode);
        assert_eq!(report.partial_reply_streams, 1);

        let stored = ws.stored();
        assert_eq!(ids(&stored), vec!["c1", "c2"]);
        assert_eq!(reply_ids(&stored[0]), vec!["r1", "r2"]);
        assert_eq!(reply_ids(&stored[1]), vec!["r9"]);
    }
}

#[tokio::test]
async fn test_failed_comment_page_interrupts_and_resumes() {
    let server = MockServer::start().await;
    mount_comments(&server, 0, page_body(&["c1"], 1, true)).await;
    Mock::given(method("GET"))
        .and(path(COMMENT_PATH))
        .and(query_param("cursor", "1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_comments(&server, 1, page_body(&["c2"], 2, false)).await;
    mount_replies(&server, "c1", 0, ok(page_body(&["r1"], 1, false))).await;
    mount_replies(&server, "c2", 0, ok(page_body(&[], 0, false))).await;

    let ws = Workspace::new();
    let config = ws.config(&server, CrawlMode::Concurrent);

    let first = crawl(config.clone(), false, false).await.unwrap();
    assert!(matches!(first.status, CrawlStatus::Interrupted { .. }));
    assert_eq!(ids(&ws.stored()), vec!["c1"]);

    let second = crawl(config, false, false).await.unwrap();
    assert_eq!(second.status, CrawlStatus::Completed);
    assert_eq!(second.comments_added, 1);
    let stored = ws.stored();
    assert_eq!(ids(&stored), vec!["c1", "c2"]);
    assert_eq!(reply_ids(&stored[0]), vec!["r1"]);
}

/// Upstream with three comments over two pages and paginated replies
async fn stable_upstream() -> MockServer {
    let server = MockServer::start().await;
    mount_comments(&server, 0, page_body(&["c1", "c2"], 2, true)).await;
    mount_comments(&server, 2, page_body(&["c3"], 3, false)).await;
    mount_replies(&server, "c1", 0, ok(page_body(&["r1", "r2"], 2, true))).await;
    mount_replies(&server, "c1", 2, ok(page_body(&["r3"], 3, false))).await;
    mount_replies(&server, "c2", 0, ok(page_body(&[], 0, false))).await;
    mount_replies(&server, "c3", 0, ok(page_body(&["r4", "r5"], 2, true))).await;
    mount_replies(&server, "c3", 2, ok(page_body(&[], 4, true))).await;
    mount_replies(&server, "c3", 4, ok(page_body(&["r6"], 6, false))).await;
    server
}

#[tokio::test]
async fn test_resume_after_truncation_is_idempotent() {
    let server = stable_upstream().await;

    for mode in MODES {
        let reference = Workspace::new();
        crawl(reference.config(&server, mode), false, false)
            .await
            .unwrap();
        let expected = reference.stored();
        assert_eq!(ids(&expected), vec!["c1", "c2", "c3"]);

        // Every comment prefix, and every reply prefix of the last comment
        let mut prefixes = Vec::new();
        for n in 0..=expected.len() {
            prefixes.push(expected[..n].to_vec());
            if let Some(last) = expected.get(n) {
                for r in 0..last.replies.len() {
                    let mut cut = expected[..=n].to_vec();
                    cut[n].replies.truncate(r);
                    prefixes.push(cut);
                }
            }
        }

        for prefix in prefixes {
            let ws = Workspace::new();
            ws.seed(prefix.clone());
            let report = crawl(ws.config(&server, mode), false, false).await.unwrap();
            assert_eq!(report.status, CrawlStatus::Completed);
            assert_eq!(
                ws.stored(),
                expected,
                "{} resuming from {:?}",
                mode,
                ids(&prefix)
            );
        }
    }
}

#[tokio::test]
async fn test_concurrent_matches_sequential() {
    let server = stable_upstream().await;

    let sequential = Workspace::new();
    crawl(sequential.config(&server, CrawlMode::Sequential), false, false)
        .await
        .unwrap();
    let concurrent = Workspace::new();
    crawl(concurrent.config(&server, CrawlMode::Concurrent), false, false)
        .await
        .unwrap();

    assert_eq!(sequential.stored(), concurrent.stored());
}

#[tokio::test]
async fn test_fresh_run_ignores_existing_document() {
    let server = MockServer::start().await;
    mount_comments(&server, 0, page_body(&["c1"], 1, false)).await;
    mount_replies(&server, "c1", 0, ok(page_body(&["r1"], 1, false))).await;

    let ws = Workspace::new();
    let config = ws.config(&server, CrawlMode::Sequential);
    crawl(config.clone(), false, false).await.unwrap();

    let report = crawl(config, true, false).await.unwrap();
    assert_eq!(report.comments_added, 1);
    assert_eq!(report.replies_added, 1);
    assert_eq!(ids(&ws.stored()), vec!["c1"]);
}

#[tokio::test]
async fn test_missing_boundary_reply_is_drift() {
    for mode in MODES {
        let server = MockServer::start().await;
        mount_comments(&server, 0, page_body(&["c1"], 1, false)).await;
        mount_replies(&server, "c1", 0, ok(page_body(&["r1", "r2"], 2, false))).await;

        // The stored boundary reply no longer exists upstream
        let ws = Workspace::new();
        std::fs::write(
            ws.document(),
            serde_json::to_string(&json!([{
                "id": "c1",
                "author": null,
                "text": "old",
                "created_at": "2023-11-14T22:13:20Z",
                "replies": [{
                    "id": "deleted",
                    "author": null,
                    "text": "gone",
                    "created_at": "2023-11-14T22:13:20Z"
                }]
            }]))
            .unwrap(),
        )
        .unwrap();

        let err = crawl(ws.config(&server, mode), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::ResumeDrift(_)), "{}: {:?}", mode, err);
        assert_eq!(reply_ids(&ws.stored()[0]), vec!["deleted"]);
    }
}

#[tokio::test]
async fn test_corrupt_document_is_rejected() {
    let server = MockServer::start().await;
    let ws = Workspace::new();
    std::fs::write(ws.document(), "{ not json").unwrap();

    let err = crawl(ws.config(&server, CrawlMode::Sequential), false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Storage(_)));
    assert_eq!(std::fs::read_to_string(ws.document()).unwrap(), "{ not json");
}
