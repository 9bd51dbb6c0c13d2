//! Readable errors for failed HTTP responses.

use reqwest::StatusCode;

/// An HTTP response that came back with a failure status.
#[derive(Debug, PartialEq)]
pub enum HttpStatusError {
    /// HTTP 404
    NotFound,
    /// HTTP 401
    AuthenticationFailed,
    /// HTTP 403 with a rate limit message, or HTTP 429
    RateLimitExceeded,
    /// HTTP 403 otherwise
    Forbidden,
    /// Other 4xx
    ClientError(u16),
    /// 5xx
    ServerError(u16),
}

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpStatusError::NotFound => write!(f, "Not found (HTTP 404)"),
            HttpStatusError::AuthenticationFailed => {
                write!(f, "Authentication failed (HTTP 401). Check your GITHUB_TOKEN.")
            }
            HttpStatusError::RateLimitExceeded => write!(
                f,
                "Rate limit exceeded. Try again later or set the GITHUB_TOKEN environment variable."
            ),
            HttpStatusError::Forbidden => write!(f, "Access forbidden (HTTP 403)"),
            HttpStatusError::ClientError(code) => write!(f, "Request error (HTTP {})", code),
            HttpStatusError::ServerError(code) => write!(f, "Server error (HTTP {})", code),
        }
    }
}

impl std::error::Error for HttpStatusError {}

/// Classifies a failure status. `message` is the error text reqwest
/// produced, used to tell GitHub's rate limiting apart from other 403s.
pub fn classify_status(status: StatusCode, message: &str) -> HttpStatusError {
    match status {
        StatusCode::NOT_FOUND => HttpStatusError::NotFound,
        StatusCode::UNAUTHORIZED => HttpStatusError::AuthenticationFailed,
        StatusCode::TOO_MANY_REQUESTS => HttpStatusError::RateLimitExceeded,
        StatusCode::FORBIDDEN if message.contains("rate limit") => {
            HttpStatusError::RateLimitExceeded
        }
        StatusCode::FORBIDDEN => HttpStatusError::Forbidden,
        s if s.is_server_error() => HttpStatusError::ServerError(s.as_u16()),
        s => HttpStatusError::ClientError(s.as_u16()),
    }
}

/// Converts an error from `error_for_status()` into an [`HttpStatusError`]
/// when it carries a status; transport errors are passed through.
pub fn status_error(error: reqwest::Error) -> anyhow::Error {
    match error.status() {
        Some(status) => {
            anyhow::Error::from(classify_status(status, &error.to_string())).context(error)
        }
        None => anyhow::Error::from(error),
    }
}
