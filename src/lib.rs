//! Comment Harvester: a resumable crawler for threaded comment trees
//!
//! This crate walks the two nested cursor streams of a comment API (top-level
//! comments and the replies under each of them), persisting everything into a
//! single JSON document as it goes. An interrupted run picks up exactly where
//! the previous one stopped, using nothing but the persisted document.

pub mod config;
pub mod crawler;
pub mod credentials;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod target;

use thiserror::Error;

/// Main error type for Comment Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Credential error: {0}")]
    Credential(#[from] credentials::CredentialError),

    #[error("Target error: {0}")]
    Target(#[from] target::TargetError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Resume drift: {0}")]
    ResumeDrift(#[from] state::ResumeDrift),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Reply task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Comment Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Comment, Reply};
pub use state::ResumePoint;
pub use target::CrawlTarget;
