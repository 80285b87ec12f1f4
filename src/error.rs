//! Custom error types for citedash.
//!
//! All library functions return `Result<T, DashboardError>` instead of using `unwrap()`.
//! The binary wraps these in `anyhow` at the top level.

use thiserror::Error;

/// Main error type for citedash operations.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Network/HTTP transport error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream API answered with a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Human-readable message, e.g. "OpenAlex HTTP 503"
        message: String,
    },

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Paginated fetch did not terminate within the page cap
    #[error("Pagination did not finish after {0} pages")]
    PaginationLimit(usize),

    /// Every candidate URL of a fallback resource failed
    #[error("All candidate sources failed: {0}")]
    AllCandidatesFailed(String),

    /// Cache store failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl DashboardError {
    /// Build an [`DashboardError::Api`] for a failed upstream call.
    pub fn http(api: &str, status: reqwest::StatusCode) -> Self {
        Self::Api {
            code: status.as_u16(),
            message: format!("{} HTTP {}", api, status.as_u16()),
        }
    }
}

/// Result type alias using `DashboardError`
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| DashboardError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_mentions_status() {
        let err = DashboardError::http("OpenAlex", reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("OpenAlex HTTP 503"));
    }

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<i32> = None;
        assert!(matches!(missing.ok_or_parse("no id"), Err(DashboardError::Parse(_))));
        assert_eq!(Some(3).ok_or_parse("no id").unwrap(), 3);
    }
}
