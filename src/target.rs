//! Crawl target derivation
//!
//! The crawl target is the opaque identifier of the content whose comments
//! are harvested. It is derived once from the content URL and never changes
//! for the lifetime of a run.

use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors raised while deriving a crawl target
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Target URL is empty")]
    Empty,

    #[error("No identifier segment in target URL: {0}")]
    MissingIdentifier(String),
}

/// Identifier of the content being crawled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlTarget(String);

impl CrawlTarget {
    /// Derives the target from a content URL: the last non-empty path segment
    ///
    /// Strings that do not parse as absolute URLs are treated as bare paths,
    /// so `"7491129701956652306"` and `"@user/video/7491129701956652306/"`
    /// both resolve to the same identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use comment_harvester::CrawlTarget;
    ///
    /// let target = CrawlTarget::from_url("https://www.example.com/@someone/video/42?lang=en").unwrap();
    /// assert_eq!(target.as_str(), "42");
    /// ```
    pub fn from_url(input: &str) -> Result<Self, TargetError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let segment = match Url::parse(trimmed) {
            Ok(url) => url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string),
            Err(_) => trimmed
                .split(['?', '#'])
                .next()
                .and_then(|path| path.split('/').filter(|s| !s.is_empty()).last())
                .map(str::to_string),
        };

        segment
            .map(Self)
            .ok_or_else(|| TargetError::MissingIdentifier(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CrawlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment_of_url() {
        let target =
            CrawlTarget::from_url("https://www.example.com/@rizzcado/photo/7491129701956652306")
                .unwrap();
        assert_eq!(target.as_str(), "7491129701956652306");
    }

    #[test]
    fn test_trailing_slash_and_query_ignored() {
        let target = CrawlTarget::from_url("https://www.example.com/@a/video/123/?is_from=web")
            .unwrap();
        assert_eq!(target.as_str(), "123");
    }

    #[test]
    fn test_bare_identifier() {
        assert_eq!(CrawlTarget::from_url("987").unwrap().as_str(), "987");
        assert_eq!(
            CrawlTarget::from_url("@a/video/987/").unwrap().as_str(),
            "987"
        );
    }

    #[test]
    fn test_empty_and_rootless_inputs() {
        assert!(matches!(CrawlTarget::from_url("   "), Err(TargetError::Empty)));
        assert!(matches!(
            CrawlTarget::from_url("https://www.example.com/"),
            Err(TargetError::MissingIdentifier(_))
        ));
    }
}
