use crate::streaming::Side;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Vote error: {0}")]
    Vote(#[from] VoteError),

    #[error("Preferences error: {0}")]
    Preferences(#[from] crate::preferences::PreferencesError),

    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid API base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Remote API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Response has no readable body")]
    MissingBody,

    #[error("No data received from the stream for {0:?}")]
    StreamIdle(std::time::Duration),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Human-readable message stored in stream state and shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::ServerError { status: 401, .. } | ApiError::ServerError { status: 403, .. } => {
                "Authentication failed. Please sign in again.".to_string()
            }
            ApiError::ServerError { status: 429, .. } => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            ApiError::ServerError { status, message } if (500..600).contains(status) => {
                if message.trim().is_empty() {
                    format!("The translation service is unavailable (HTTP {status})")
                } else {
                    format!(
                        "The translation service is unavailable (HTTP {status}): {}",
                        message.trim()
                    )
                }
            }
            ApiError::ServerError { status, message } => {
                format!("Request failed with HTTP {status}: {}", message.trim())
            }
            ApiError::Network(e) if e.is_timeout() => "The request timed out.".to_string(),
            ApiError::Network(_) => "Could not reach the translation service.".to_string(),
            ApiError::MissingBody => "The server returned no stream to read.".to_string(),
            ApiError::StreamIdle(_) => {
                "The translation service stopped responding.".to_string()
            }
            ApiError::InvalidResponse(msg) => format!("Unexpected server response: {msg}"),
            ApiError::InvalidUrl(e) => format!("Invalid request URL: {e}"),
        }
    }
}

/// Bearer token retrieval errors
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("No API token configured (set {0})")]
    Missing(&'static str),

    #[error("Invalid token data: {0}")]
    InvalidData(String),
}

/// Reasons a comparison cannot be voted on yet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("Both translations must finish before voting")]
    NotComplete,

    #[error("{0} has no output id to vote on")]
    MissingOutputId(Side),

    #[error("{0} failed and cannot be voted on")]
    ModelFailed(Side),

    #[error("Unknown vote '{0}' (expected a, b, tie or bad)")]
    UnknownChoice(String),
}
