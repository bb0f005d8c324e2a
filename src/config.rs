//! Application configuration
//!
//! Defaults come from the embedded `config.toml`. The API base URL and the
//! auth client id can be overridden from the environment (or a `.env` file).

use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Environment variable overriding `[api] base_url`
pub(crate) const API_URL_ENV: &str = "ARENA_API_URL";

/// Environment variable overriding `[auth] client_id`
pub(crate) const AUTH_CLIENT_ID_ENV: &str = "ARENA_AUTH_CLIENT_ID";

const CONFIG_TOML: &str = include_str!("../config.toml");

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Config {
    pub(crate) api: ApiConfig,
    pub(crate) auth: AuthConfig,
    pub(crate) streaming: StreamingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiConfig {
    pub(crate) base_url: String,
    pub(crate) request_timeout_secs: u64,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) stream_idle_timeout_secs: u64,
    pub(crate) max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthConfig {
    pub(crate) client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamingConfig {
    pub(crate) debounce_ms: u64,
}

impl ApiConfig {
    /// Parse the base URL, forcing a trailing slash so relative joins keep the path prefix.
    pub(crate) fn base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub(crate) fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

impl StreamingConfig {
    pub(crate) fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Parse a TOML document without applying environment overrides.
    pub(crate) fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides using the given lookup (normally `std::env::var`).
    pub(crate) fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            info!(base_url = %url, "API base URL overridden from environment");
            self.api.base_url = url;
        }
        if let Some(client_id) = lookup(AUTH_CLIENT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.auth.client_id = client_id;
        }
    }
}

/// Load configuration from embedded config.toml plus environment overrides
pub(crate) fn load_config() -> Result<Config, ConfigError> {
    // A missing .env file is the normal case
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {:?}", path);
    }

    let mut config = Config::from_toml(CONFIG_TOML)?;
    config.apply_overrides(|key| std::env::var(key).ok());

    // Fail early on a malformed URL rather than at the first request
    config.api.base_url()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_config_parses() {
        let config = Config::from_toml(CONFIG_TOML).expect("embedded config must parse");
        assert_eq!(config.streaming.debounce(), Duration::from_millis(16));
        assert!(config.api.max_retries > 0);
        assert!(config.api.stream_idle_timeout() > Duration::ZERO);
        assert!(config.api.base_url().is_ok());
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = Config::from_toml(CONFIG_TOML).expect("embedded config must parse");
        let env: HashMap<&str, &str> = [
            (API_URL_ENV, "https://arena.example.com/v2"),
            (AUTH_CLIENT_ID_ENV, "client-123"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://arena.example.com/v2");
        assert_eq!(config.auth.client_id, "client-123");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = Config::from_toml(CONFIG_TOML).expect("embedded config must parse");
        let original = config.api.base_url.clone();
        config.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.api.base_url, original);
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let api = ApiConfig {
            base_url: "https://arena.example.com/api".to_string(),
            request_timeout_secs: 1,
            connect_timeout_secs: 1,
            stream_idle_timeout_secs: 1,
            max_retries: 0,
        };
        let base = api.base_url().expect("valid url");
        let joined = base.join("leaderboard").expect("join");
        assert_eq!(joined.as_str(), "https://arena.example.com/api/leaderboard");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let api = ApiConfig {
            base_url: "not a url".to_string(),
            request_timeout_secs: 1,
            connect_timeout_secs: 1,
            stream_idle_timeout_secs: 1,
            max_retries: 0,
        };
        assert!(matches!(
            api.base_url(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }
}
