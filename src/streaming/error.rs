//! Error types for streaming sessions

/// Errors returned synchronously from `start()`.
///
/// Everything that happens after the stream opens is reported through
/// session state and callbacks instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("{0}")]
    Validation(String),

    #[error("A translation session is already running")]
    Busy,
}

pub(crate) const MISSING_TOKEN: &str = "Please sign in before requesting a translation";
pub(crate) const MISSING_MODEL: &str = "No model selected";
pub(crate) const MISSING_TEXT: &str = "Nothing to translate";
