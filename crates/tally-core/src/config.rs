//! Remote service configuration.
//!
//! Values come from the environment (`TALLY_API_URL`, `TALLY_API_TOKEN`);
//! secret tokens are never written to the mirror database.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Environment variable naming the tracker API base URL.
pub const API_URL_VAR: &str = "TALLY_API_URL";
/// Environment variable naming the tracker API token.
pub const API_TOKEN_VAR: &str = "TALLY_API_TOKEN";

/// Connection settings for the remote tracker API.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the tracker API (e.g. `https://api.example.com`)
    pub api_url: String,
    /// Bearer token for API authentication
    pub api_token: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

impl RemoteConfig {
    /// Build a config from explicit values, validating and normalizing them.
    pub fn new(api_url: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        let api_url = normalize_text_option(Some(api_url.into()))
            .ok_or_else(|| Error::Validation("API URL must not be empty".to_string()))?;
        if !is_http_url(&api_url) {
            return Err(Error::Validation(format!(
                "API URL must include http:// or https://, got '{api_url}'"
            )));
        }

        let api_token = normalize_text_option(Some(api_token.into()))
            .ok_or_else(|| Error::Validation("API token must not be empty".to_string()))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Read the config from `TALLY_API_URL` / `TALLY_API_TOKEN`.
    ///
    /// Returns `None` when either variable is unset or blank; invalid values
    /// in set variables are an error.
    pub fn from_env() -> Result<Option<Self>> {
        let url = normalize_text_option(env::var(API_URL_VAR).ok());
        let token = normalize_text_option(env::var(API_TOKEN_VAR).ok());

        match (url, token) {
            (Some(url), Some(token)) => Self::new(url, token).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_trailing_slash() {
        let config = RemoteConfig::new("https://api.example.com/", "secret").unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
    }

    #[test]
    fn new_rejects_non_http_url() {
        assert!(RemoteConfig::new("api.example.com", "secret").is_err());
        assert!(RemoteConfig::new("", "secret").is_err());
    }

    #[test]
    fn new_rejects_blank_token() {
        assert!(RemoteConfig::new("https://api.example.com", "  ").is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let config = RemoteConfig::new("https://api.example.com", "secret").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
