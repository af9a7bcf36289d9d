//! Credential loading and pooling
//!
//! A credential is one independent set of session cookies, loaded from a
//! browser cookie export. Several credentials can be pooled so that reply
//! fan-out spreads requests across accounts.

mod pool;

pub use pool::{CredentialLease, CredentialPool};

use reqwest::header::HeaderValue;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading credentials
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read credential file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse credential file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Credential file {0} contains no cookies")]
    Empty(PathBuf),

    #[error("Cookie {name} in credential file {path} cannot be sent in a Cookie header")]
    InvalidCookie { path: PathBuf, name: String },

    #[error("Credential pool requires at least one credential")]
    EmptyPool,
}

/// One cookie entry of an export file; any other fields are ignored
#[derive(Debug, Deserialize)]
struct CookieEntry {
    name: String,
    value: String,
}

/// A named set of cookies sent together with every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    label: String,
    cookies: Vec<(String, String)>,
}

impl Credential {
    pub fn new(label: impl Into<String>, cookies: Vec<(String, String)>) -> Self {
        Self {
            label: label.into(),
            cookies,
        }
    }

    /// Loads a credential from a JSON array of `{"name": .., "value": ..}` objects
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let entries: Vec<CookieEntry> =
            serde_json::from_str(&content).map_err(|source| CredentialError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if entries.is_empty() {
            return Err(CredentialError::Empty(path.to_path_buf()));
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| HeaderValue::from_str(&format!("{}={}", e.name, e.value)).is_err())
        {
            return Err(CredentialError::InvalidCookie {
                path: path.to_path_buf(),
                name: bad.name.clone(),
            });
        }

        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("credential")
            .to_string();

        Ok(Self::new(
            label,
            entries.into_iter().map(|e| (e.name, e.value)).collect(),
        ))
    }

    /// Short name used in logs; never includes cookie values
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cookie_count(&self) -> usize {
        self.cookies.len()
    }

    /// Renders the cookies as a `Cookie` request header value
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Loads every credential file, in order
pub fn load_credentials<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Credential>, CredentialError> {
    paths
        .iter()
        .map(|p| Credential::from_file(p.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_cookie_export() {
        let file = create_temp_file(
            r#"[
                {"name": "sessionid", "value": "abc", "domain": ".example.com", "secure": true},
                {"name": "tt_csrf", "value": "xyz"}
            ]"#,
        );

        let credential = Credential::from_file(file.path()).unwrap();
        assert_eq!(credential.cookie_count(), 2);
        assert_eq!(credential.cookie_header(), "sessionid=abc; tt_csrf=xyz");
    }

    #[test]
    fn test_empty_export_rejected() {
        let file = create_temp_file("[]");
        assert!(matches!(
            Credential::from_file(file.path()),
            Err(CredentialError::Empty(_))
        ));
    }

    #[test]
    fn test_malformed_export_rejected() {
        let file = create_temp_file(r#"{"sessionid": "abc"}"#);
        assert!(matches!(
            Credential::from_file(file.path()),
            Err(CredentialError::Parse { .. })
        ));
    }

    #[test]
    fn test_cookie_with_control_character_rejected() {
        let file = create_temp_file(
            r#"[
                {"name": "tt_csrf", "value": "xyz"},
                {"name": "sessionid", "value": "abc\n123"}
            ]"#,
        );

        match Credential::from_file(file.path()) {
            Err(CredentialError::InvalidCookie { name, .. }) => assert_eq!(name, "sessionid"),
            other => panic!("expected an invalid cookie error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_rejected() {
        let result = load_credentials(&["/nonexistent/cookies.json"]);
        assert!(matches!(result, Err(CredentialError::Io { .. })));
    }
}
