//! Upstream comment API client
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured identity headers
//! - Requesting comment pages and reply pages with a cursor and a count
//! - Decoding page bodies, tolerating both generic and service field names
//! - Classifying failures as transport, status, or decode errors

use crate::config::ApiConfig;
use crate::credentials::Credential;
use crate::model::{Comment, Reply};
use crate::target::CrawlTarget;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest response body excerpt kept in a status error
const BODY_EXCERPT_LEN: usize = 200;

/// A failed page request; ends the stream it belongs to
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{endpoint}: request failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint}: HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint}: malformed response body: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    #[error("{endpoint}: cursor did not advance past {cursor}")]
    StalledCursor { endpoint: String, cursor: u64 },

    #[error("{endpoint}: credential {label} does not form a valid Cookie header")]
    InvalidCookie { endpoint: String, label: String },
}

impl FetchError {
    /// Human-readable name of the call that failed
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Decode { endpoint, .. }
            | Self::StalledCursor { endpoint, .. }
            | Self::InvalidCookie { endpoint, .. } => endpoint,
        }
    }
}

/// Author block of an item
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiAuthor {
    #[serde(alias = "nickname", default)]
    pub display_name: Option<String>,
}

/// One comment or reply as delivered by the API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiItem {
    #[serde(alias = "cid")]
    pub id: String,

    #[serde(alias = "user", default)]
    pub author: Option<ApiAuthor>,

    pub text: String,

    #[serde(alias = "create_time", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl ApiItem {
    fn author_name(&mut self) -> Option<String> {
        self.author.take().and_then(|a| a.display_name)
    }

    /// Converts a top-level item into a comment with no replies yet
    pub fn into_comment(mut self) -> Comment {
        let author = self.author_name();
        Comment {
            id: self.id,
            author,
            text: self.text,
            created_at: self.created_at,
            replies: Vec::new(),
        }
    }

    pub fn into_reply(mut self) -> Reply {
        let author = self.author_name();
        Reply {
            id: self.id,
            author,
            text: self.text,
            created_at: self.created_at,
        }
    }
}

/// One page of a cursor stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(alias = "comments", default, deserialize_with = "null_as_empty")]
    pub items: Vec<ApiItem>,

    /// Cursor to request the following page with
    #[serde(default)]
    pub cursor: u64,

    #[serde(default, deserialize_with = "flag")]
    pub has_more: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ApiItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ApiItem>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `true`/`false` as well as `1`/`0`
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}

/// The two list endpoints the crawler consumes
#[async_trait]
pub trait CommentApi: Send + Sync {
    /// Fetches one page of top-level comments
    async fn list_comments(
        &self,
        credential: &Credential,
        target: &CrawlTarget,
        cursor: u64,
    ) -> Result<Page, FetchError>;

    /// Fetches one page of replies under `comment_id`
    async fn list_replies(
        &self,
        credential: &Credential,
        target: &CrawlTarget,
        comment_id: &str,
        cursor: u64,
    ) -> Result<Page, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - The referer is not a valid header value or the
///   client could not be built
pub fn build_http_client(config: &ApiConfig) -> crate::Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(referer) = &config.referer {
        let value = HeaderValue::from_str(referer).map_err(|_| {
            crate::ConfigError::Validation(format!(
                "referer is not a valid header value: {:?}",
                referer
            ))
        })?;
        headers.insert(REFERER, value);
    }

    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// reqwest-backed implementation of [`CommentApi`]
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    comment_url: Url,
    reply_url: Url,
    config: ApiConfig,
    comment_page_size: u32,
    reply_page_size: u32,
}

impl HttpApi {
    pub fn new(
        config: &ApiConfig,
        comment_page_size: u32,
        reply_page_size: u32,
    ) -> Result<Self, crate::HarvestError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| crate::ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;
        let comment_url = base.join(&config.comment_path).map_err(|e| {
            crate::ConfigError::InvalidUrl(format!("Invalid comment_path: {}", e))
        })?;
        let reply_url = base
            .join(&config.reply_path)
            .map_err(|e| crate::ConfigError::InvalidUrl(format!("Invalid reply_path: {}", e)))?;

        Ok(Self {
            client: build_http_client(config)?,
            comment_url,
            reply_url,
            config: config.clone(),
            comment_page_size,
            reply_page_size,
        })
    }

    async fn get_page(
        &self,
        url: &Url,
        params: Vec<(&str, String)>,
        credential: &Credential,
        endpoint: String,
    ) -> Result<Page, FetchError> {
        let request = self.client.get(url.clone()).query(&self.config.query).query(&params);

        let cookie = HeaderValue::from_str(&credential.cookie_header()).map_err(|_| {
            FetchError::InvalidCookie {
                endpoint: endpoint.clone(),
                label: credential.label().to_string(),
            }
        })?;
        let request = request.header(COOKIE, cookie);

        let response = request.send().await.map_err(|source| FetchError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| FetchError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint,
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| FetchError::Decode { endpoint, source })
    }
}

#[async_trait]
impl CommentApi for HttpApi {
    async fn list_comments(
        &self,
        credential: &Credential,
        target: &CrawlTarget,
        cursor: u64,
    ) -> Result<Page, FetchError> {
        let params = vec![
            (self.config.target_param.as_str(), target.to_string()),
            ("cursor", cursor.to_string()),
            ("count", self.comment_page_size.to_string()),
        ];
        let endpoint = format!("comment list (cursor {})", cursor);
        tracing::debug!("Requesting {}", endpoint);
        self.get_page(&self.comment_url, params, credential, endpoint)
            .await
    }

    async fn list_replies(
        &self,
        credential: &Credential,
        target: &CrawlTarget,
        comment_id: &str,
        cursor: u64,
    ) -> Result<Page, FetchError> {
        let params = vec![
            (self.config.reply_parent_param.as_str(), comment_id.to_string()),
            ("cursor", cursor.to_string()),
            ("count", self.reply_page_size.to_string()),
            (self.config.reply_target_param.as_str(), target.to_string()),
        ];
        let endpoint = format!("reply list of comment {} (cursor {})", comment_id, cursor);
        tracing::debug!("Requesting {}", endpoint);
        self.get_page(&self.reply_url, params, credential, endpoint)
            .await
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
