//! Crate-level error type.
//!
//! Transport errors carry enough context (URL, status, detail) to diagnose a
//! failed poll from a single log line. None of these ever escape the poll
//! loop; they surface only from setup paths (config load, client build) and
//! the one-shot CLI commands.

use thiserror::Error;

/// Errors produced by the shoutbox client.
#[derive(Debug, Error)]
pub enum ShoutboxError {
    /// A TCP-level connection could not be established or the request timed out.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// The remote server replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error from {url}: {detail}")]
    Json { url: String, detail: String },

    /// A base URL or endpoint could not be parsed.
    #[error("invalid URL '{input}': {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },

    /// The configuration is structurally valid TOML but semantically wrong.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ShoutboxError>;

impl ShoutboxError {
    /// `true` for failures the poll loop should simply retry on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ShoutboxError::Connect { .. } | ShoutboxError::Http { .. } | ShoutboxError::Json { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_http_contains_status_and_url() {
        let err = ShoutboxError::Http {
            status: 503,
            url: "http://localhost/api/v1/chat/messages?chat=1".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("503"), "expected status in display: {s}");
        assert!(s.contains("chat=1"), "expected url in display: {s}");
    }

    #[test]
    fn display_connect_contains_detail() {
        let err = ShoutboxError::Connect {
            url: "http://localhost".to_string(),
            detail: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn display_json_contains_detail() {
        let err = ShoutboxError::Json {
            url: "http://localhost/api/v1/user/stats".to_string(),
            detail: "missing field `ratio`".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("user/stats"), "{s}");
        assert!(s.contains("missing field"), "{s}");
    }

    #[test]
    fn invalid_url_keeps_source() {
        let source = url::Url::parse("not a url").unwrap_err();
        let err = ShoutboxError::InvalidUrl {
            input: "not a url".to_string(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn transport_errors_are_transient() {
        assert!(ShoutboxError::Http { status: 500, url: "x".into() }.is_transient());
        assert!(ShoutboxError::Connect { url: "x".into(), detail: "y".into() }.is_transient());
        assert!(ShoutboxError::Json { url: "x".into(), detail: "y".into() }.is_transient());
    }

    #[test]
    fn config_errors_are_not_transient() {
        assert!(!ShoutboxError::Config("no rooms".into()).is_transient());
    }
}
