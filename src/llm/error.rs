//! Completion-backend error types.
//!
//! Errors carry a kind so callers can tell transient failures (rate limits,
//! 5xx, network) from permanent ones (bad request, bad key, unparseable body).

use std::time::Duration;

/// Error from a completion-backend call.
#[derive(Debug, Clone)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    pub message: String,
    /// Value of the Retry-After header, if the backend sent one
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            status_code: Some(429),
            message: message.into(),
            retry_after,
        }
    }

    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ServerError,
            status_code: Some(status_code),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn client_error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ClientError,
            status_code: Some(status_code),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Build an error from a non-success HTTP response.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        match classify_http_status(status) {
            LlmErrorKind::RateLimited => Self::rate_limited(body, retry_after),
            LlmErrorKind::ClientError => Self::client_error(status, body),
            _ => Self::server_error(status, body),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Delay before the next attempt: Retry-After if present, otherwise
    /// exponential backoff from a per-kind base, capped at 60 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_secs: u64 = match self.kind {
            LlmErrorKind::RateLimited => 5,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        };

        let delay_secs = base_secs.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(delay_secs.min(60))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of completion-backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429
    RateLimited,
    /// 5xx
    ServerError,
    /// 4xx other than 429 (bad request, invalid key, unknown model)
    ClientError,
    /// Connection failure or timeout
    NetworkError,
    /// Response body did not match the expected shape
    ParseError,
}

impl LlmErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Transport-level retry policy of the HTTP client.
///
/// The orchestrator never retries on its own; this only covers re-sending the
/// same HTTP request when the operator opts in with `LLM_MAX_RETRIES`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Upper bound on the total time spent retrying
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RetryConfig {
    /// Single attempt, failures surface immediately.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            max_retry_duration: Duration::ZERO,
        }
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            max_retry_duration: Duration::from_secs(120),
        }
    }

    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_retries
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(404), LlmErrorKind::ClientError);
    }

    #[test]
    fn test_disabled_retry_never_retries() {
        let config = RetryConfig::default();
        let error = LlmError::rate_limited("slow down", None);
        assert!(!config.should_retry(&error, 0));
    }

    #[test]
    fn test_permanent_errors_not_retried() {
        let config = RetryConfig::with_max_retries(3);
        assert!(config.should_retry(&LlmError::server_error(502, "bad gateway"), 0));
        assert!(!config.should_retry(&LlmError::client_error(401, "bad key"), 0));
        assert!(!config.should_retry(&LlmError::server_error(502, "bad gateway"), 3));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let error = LlmError::server_error(500, "boom");
        assert!(error.suggested_delay(1) > error.suggested_delay(0));
        assert_eq!(error.suggested_delay(20), Duration::from_secs(60));

        let error = LlmError::rate_limited("wait", Some(Duration::from_secs(7)));
        assert_eq!(error.suggested_delay(4), Duration::from_secs(7));
    }
}
