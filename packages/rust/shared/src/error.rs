//! Error types for pocsync.
//!
//! Library crates use [`PocsyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pocsync operations.
#[derive(Debug, thiserror::Error)]
pub enum PocsyncError {
    /// Calls API credentials are missing. Never retried.
    #[error("calls API not configured: {message}")]
    NotConfigured { message: String },

    /// Non-retryable status returned by the calls API.
    #[error("calls API error: HTTP {status} - {message}")]
    Upstream { status: u16, message: String },

    /// Every attempt hit a rate limit, server error, or network fault.
    #[error("calls API request failed after {attempts} attempts: {last_error}")]
    UpstreamExhausted { attempts: u32, last_error: String },

    /// Response body did not have the expected JSON shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// HTTP client could not be built.
    #[error("network error: {0}")]
    Network(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record was not found in local storage.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid caller input (dates, domains, identifiers).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PocsyncError>;

impl PocsyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a not-configured error from any displayable message.
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error naming the missing record.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status an outer request handler should answer with.
    ///
    /// Upstream statuses pass through as-is; exhausted retries and malformed
    /// upstream bodies map to 502, missing credentials to 503.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotConfigured { .. } => 503,
            Self::Upstream { status, .. } => *status,
            Self::UpstreamExhausted { .. } | Self::Parse { .. } => 502,
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 400,
            Self::Network(_) | Self::Config { .. } | Self::Storage(_) | Self::Io { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PocsyncError::config("missing base URL");
        assert_eq!(err.to_string(), "config error: missing base URL");

        let err = PocsyncError::Upstream {
            status: 404,
            message: "call not found".into(),
        };
        assert_eq!(err.to_string(), "calls API error: HTTP 404 - call not found");

        let err = PocsyncError::UpstreamExhausted {
            attempts: 4,
            last_error: "HTTP 503".into(),
        };
        assert!(err.to_string().contains("after 4 attempts"));
    }

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(PocsyncError::not_configured("no key").http_status(), 503);
        assert_eq!(
            PocsyncError::Upstream {
                status: 403,
                message: String::new(),
            }
            .http_status(),
            403
        );
        assert_eq!(
            PocsyncError::UpstreamExhausted {
                attempts: 4,
                last_error: String::new(),
            }
            .http_status(),
            502
        );
        assert_eq!(PocsyncError::parse("bad json").http_status(), 502);
        assert_eq!(PocsyncError::not_found("call x").http_status(), 404);
    }
}
