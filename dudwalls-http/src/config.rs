//! Connection settings for the HTTP backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use dudwalls_core::error::{DocumentStoreError, DocumentStoreResult};

/// Environment variable holding the server endpoint, e.g. `https://db.example.com`.
pub const ENDPOINT_ENV: &str = "DUDWALLS_ENDPOINT";
/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DUDWALLS_API_KEY";
/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "DUDWALLS_TIMEOUT_SECS";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings for [`HttpStore`](crate::HttpStore).
///
/// Deserializable so it can sit inside an application's own configuration
/// file; missing fields take their defaults.
///
/// ```ignore
/// let config: HttpStoreConfig = serde_json::from_value(json!({
///     "endpoint": "https://db.example.com",
///     "api_key": "secret",
/// }))?;
/// assert_eq!(config.timeout_secs, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStoreConfig {
    /// Server root, without the `/api/dudwalls` suffix.
    pub endpoint: String,
    /// Bearer token sent with every API request.
    pub api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Overrides the default `User-Agent` header.
    pub user_agent: Option<String>,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl HttpStoreConfig {
    /// Creates a configuration with the default timeout.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Reads `DUDWALLS_ENDPOINT`, `DUDWALLS_API_KEY` and the optional
    /// `DUDWALLS_TIMEOUT_SECS` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if a required variable is
    /// missing or the timeout is not a whole number of seconds.
    pub fn from_env() -> DocumentStoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> DocumentStoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| DocumentStoreError::Initialization(format!("{name} is not set")))
        };

        let timeout_secs = match lookup(TIMEOUT_ENV) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                DocumentStoreError::Initialization(format!("{TIMEOUT_ENV} must be a whole number of seconds, got `{raw}`"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            endpoint: required(ENDPOINT_ENV)?,
            api_key: required(API_KEY_ENV)?,
            timeout_secs,
            user_agent: None,
        })
    }

    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The `User-Agent` header value.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("Dudwalls-Rust-SDK/{}", env!("CARGO_PKG_VERSION")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn reads_required_and_optional_variables() {
        let config = HttpStoreConfig::from_lookup(lookup(&[
            (ENDPOINT_ENV, "https://db.example.com"),
            (API_KEY_ENV, "key"),
            (TIMEOUT_ENV, "3"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "https://db.example.com");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn missing_endpoint_or_bad_timeout_fail() {
        assert!(HttpStoreConfig::from_lookup(lookup(&[(API_KEY_ENV, "key")])).is_err());
        assert!(HttpStoreConfig::from_lookup(lookup(&[(ENDPOINT_ENV, "http://x"), (API_KEY_ENV, " ")])).is_err());
        assert!(
            HttpStoreConfig::from_lookup(lookup(&[
                (ENDPOINT_ENV, "http://x"),
                (API_KEY_ENV, "key"),
                (TIMEOUT_ENV, "soon"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: HttpStoreConfig =
            serde_json::from_value(json!({"endpoint": "http://x", "api_key": "k"})).unwrap();

        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.user_agent().starts_with("Dudwalls-Rust-SDK/"));
    }
}
