use crate::config::types::{
    ApiConfig, Config, CrawlerConfig, CredentialsConfig, OutputConfig, TargetConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_target_config(&config.target)?;
    validate_credentials_config(&config.credentials)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_replies < 1 || config.max_concurrent_replies > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_replies must be between 1 and 64, got {}",
            config.max_concurrent_replies
        )));
    }

    if config.comment_page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "comment_page_size must be >= 1, got {}",
            config.comment_page_size
        )));
    }

    if config.reply_page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "reply_page_size must be >= 1, got {}",
            config.reply_page_size
        )));
    }

    if config.max_resume_skip == Some(0) {
        return Err(ConfigError::Validation(
            "max_resume_skip must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the upstream API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    for (name, path) in [
        ("comment_path", &config.comment_path),
        ("reply_path", &config.reply_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "{} must start with '/', got '{}'",
                name, path
            )));
        }
    }

    for (name, param) in [
        ("target_param", &config.target_param),
        ("reply_parent_param", &config.reply_parent_param),
        ("reply_target_param", &config.reply_target_param),
    ] {
        if param.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if let Some(referer) = &config.referer {
        Url::parse(referer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referer: {}", e)))?;
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    if config.url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "target url cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_credentials_config(config: &CredentialsConfig) -> Result<(), ConfigError> {
    if config.files.is_empty() {
        return Err(ConfigError::Validation(
            "at least one credential file is required".to_string(),
        ));
    }

    if config.files.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "credential file paths cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.document_path.is_empty() {
        return Err(ConfigError::Validation(
            "document_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}
