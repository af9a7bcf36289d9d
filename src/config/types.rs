use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Main configuration structure for Comment Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub api: ApiConfig,
    pub target: TargetConfig,
    pub credentials: CredentialsConfig,
    pub output: OutputConfig,
}

/// How reply streams are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// One comment at a time, one reply page at a time
    Sequential,
    /// Reply streams of a comment page are fanned out across credentials
    #[default]
    Concurrent,
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl FromStr for CrawlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(format!(
                "unknown crawl mode '{}' (expected 'sequential' or 'concurrent')",
                other
            )),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Scheduling model for reply streams
    #[serde(default)]
    pub mode: CrawlMode,

    /// Maximum number of reply streams walked at once (concurrent mode)
    #[serde(rename = "max-concurrent-replies", default = "default_concurrency")]
    pub max_concurrent_replies: u32,

    /// Items requested per comment page
    #[serde(rename = "comment-page-size", default = "default_comment_page_size")]
    pub comment_page_size: u32,

    /// Items requested per reply page
    #[serde(rename = "reply-page-size", default = "default_reply_page_size")]
    pub reply_page_size: u32,

    /// Pause between consecutive comment page requests (milliseconds)
    #[serde(rename = "comment-page-delay-ms", default = "default_comment_delay")]
    pub comment_page_delay_ms: u64,

    /// Pause between consecutive reply page requests of one stream (milliseconds)
    #[serde(rename = "reply-page-delay-ms", default = "default_reply_delay")]
    pub reply_page_delay_ms: u64,

    /// Upper bound on replies discarded while searching for the resume boundary
    #[serde(rename = "max-resume-skip", default)]
    pub max_resume_skip: Option<usize>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            mode: CrawlMode::default(),
            max_concurrent_replies: default_concurrency(),
            comment_page_size: default_comment_page_size(),
            reply_page_size: default_reply_page_size(),
            comment_page_delay_ms: default_comment_delay(),
            reply_page_delay_ms: default_reply_delay(),
            max_resume_skip: None,
        }
    }
}

fn default_concurrency() -> u32 {
    8
}

fn default_comment_page_size() -> u32 {
    20
}

fn default_reply_page_size() -> u32 {
    10
}

fn default_comment_delay() -> u64 {
    1000
}

fn default_reply_delay() -> u64 {
    500
}

/// Upstream API endpoints and request shape
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the API, e.g. "https://www.example.com"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the "list comments" endpoint
    #[serde(rename = "comment-path")]
    pub comment_path: String,

    /// Path of the "list replies of a comment" endpoint
    #[serde(rename = "reply-path")]
    pub reply_path: String,

    /// Query parameter carrying the crawl target on the comment endpoint
    #[serde(rename = "target-param", default = "default_target_param")]
    pub target_param: String,

    /// Query parameter carrying the parent comment id on the reply endpoint
    #[serde(rename = "reply-parent-param", default = "default_reply_parent_param")]
    pub reply_parent_param: String,

    /// Query parameter carrying the crawl target on the reply endpoint
    #[serde(rename = "reply-target-param", default = "default_reply_target_param")]
    pub reply_target_param: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub referer: Option<String>,

    /// Whole-request timeout enforced by the HTTP client (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,

    /// Static query parameters sent with every request
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

fn default_target_param() -> String {
    "aweme_id".to_string()
}

fn default_reply_parent_param() -> String {
    "comment_id".to_string()
}

fn default_reply_target_param() -> String {
    "item_id".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// The content whose comments are harvested
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// URL of the content; its last path segment is the crawl target id
    pub url: String,
}

/// Credential sources
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Cookie export files, one credential set per file
    pub files: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON document holding all harvested comments
    #[serde(rename = "document-path")]
    pub document_path: String,
}
