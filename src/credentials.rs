//! Bearer token supply for API requests
//!
//! The sign-in flow lives outside this client; it only needs a bearer token
//! string on demand. Tokens are cleared from memory when dropped.
//!
//! # Security
//! - Token contents never appear in `Debug` output or logs
//! - Token memory is zeroized on drop

use crate::error::CredentialsError;
use std::fmt;
use zeroize::Zeroize;

/// Environment variable holding the API bearer token
pub(crate) const API_TOKEN_ENV: &str = "ARENA_API_TOKEN";

/// A bearer token for the arena API.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token, rejecting blank values and embedded whitespace.
    pub(crate) fn new(raw: impl Into<String>) -> Result<Self, CredentialsError> {
        let mut raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            raw.zeroize();
            return Err(CredentialsError::InvalidData("token is empty".to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            raw.zeroize();
            return Err(CredentialsError::InvalidData(
                "token contains whitespace".to_string(),
            ));
        }
        let token = trimmed.to_string();
        raw.zeroize();
        Ok(Self(token))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl Drop for BearerToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Something that can hand out the current bearer token.
pub(crate) trait TokenSource: Send + Sync {
    /// Current token, or `None` when the user is not signed in.
    fn bearer_token(&self) -> Option<BearerToken>;
}

/// Reads the token from the process environment on every request, so a
/// refreshed token is picked up without restarting.
#[derive(Debug, Default)]
pub(crate) struct EnvTokenSource;

impl TokenSource for EnvTokenSource {
    fn bearer_token(&self) -> Option<BearerToken> {
        let raw = std::env::var(API_TOKEN_ENV).ok()?;
        BearerToken::new(raw).ok()
    }
}

/// A fixed token.
#[derive(Debug)]
pub(crate) struct StaticTokenSource(Option<BearerToken>);

impl StaticTokenSource {
    pub(crate) fn new(token: Option<BearerToken>) -> Self {
        Self(token)
    }
}

impl TokenSource for StaticTokenSource {
    fn bearer_token(&self) -> Option<BearerToken> {
        self.0.clone()
    }
}

/// Token from the source, or an error naming where it should come from.
pub(crate) fn require_token(source: &dyn TokenSource) -> Result<BearerToken, CredentialsError> {
    source
        .bearer_token()
        .ok_or(CredentialsError::Missing(API_TOKEN_ENV))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_trimmed() {
        let token = BearerToken::new("  abc.def.ghi \n").expect("valid token");
        assert_eq!(token.as_str(), "abc.def.ghi");
    }

    #[test]
    fn test_blank_token_is_rejected() {
        assert!(matches!(
            BearerToken::new("   "),
            Err(CredentialsError::InvalidData(_))
        ));
        assert!(BearerToken::new("abc def").is_err());
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let token = BearerToken::new("secret-value").expect("valid token");
        let printed = format!("{:?}", token);
        assert!(!printed.contains("secret-value"));
    }

    #[test]
    fn test_static_source() {
        let source = StaticTokenSource::new(Some(BearerToken::new("t0k").expect("valid")));
        assert_eq!(
            require_token(&source).expect("token present").as_str(),
            "t0k"
        );

        let empty = StaticTokenSource::new(None);
        assert!(matches!(
            require_token(&empty),
            Err(CredentialsError::Missing(API_TOKEN_ENV))
        ));
    }
}
