//! Failure taxonomy shared by the retry engine, the HTTP client and the
//! orchestrator.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure, timeout, reset or truncated body
    Network,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    Server,
    /// HTTP 4xx other than 404 and 429
    Client,
    /// HTTP 404
    NotFound,
    /// Successful response that could not be decoded
    MalformedResponse,
    /// Checkpoint data that could not be read back
    StateCorruption,
    /// Configuration rejected before any request
    InvalidConfiguration,
    /// Shutdown observed while waiting
    Interrupted,
}

impl ErrorKind {
    /// Whether the retry engine may try again after this kind of failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server)
    }

    /// Stable snake_case label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network_error",
            Self::RateLimited => "rate_limited",
            Self::Server => "server_error",
            Self::Client => "client_error",
            Self::NotFound => "not_found",
            Self::MalformedResponse => "malformed_response",
            Self::StateCorruption => "state_corruption",
            Self::InvalidConfiguration => "invalid_configuration",
            Self::Interrupted => "interrupted",
        }
    }

    /// Map an HTTP status code onto the taxonomy.
    ///
    /// Statuses outside the 4xx/5xx range that still reach this point (an
    /// unfollowed redirect, for example) cannot be decoded as a payload and are
    /// reported as malformed.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            400..=499 => Self::Client,
            _ => Self::MalformedResponse,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed attempt of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    /// Failure classification
    pub kind: ErrorKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Server-provided wait hint (Retry-After)
    pub retry_after: Option<Duration>,
    /// Human-readable detail
    pub message: String,
}

impl FetchFailure {
    /// Failure of the given kind with no HTTP context.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            retry_after: None,
            message: message.into(),
        }
    }

    /// Failure built from a non-success HTTP response.
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            retry_after,
            message: format!("HTTP {status}: {}", truncate(body, 200)),
        }
    }

    /// Transport-level failure before a full response was read.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_body() || err.is_decode() {
            "response body interrupted"
        } else {
            "network error"
        };
        Self::new(ErrorKind::Network, format!("{detail}: {err}"))
    }

    /// Payload could not be decoded.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    /// The attempt was abandoned because shutdown was requested.
    pub fn interrupted() -> Self {
        Self::new(ErrorKind::Interrupted, "shutdown requested")
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Error that ends the retry lifecycle of one remote call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{operation} failed with {kind} after {attempts} attempt(s): {message}")]
pub struct TerminalError {
    /// Kind of the last failure
    pub kind: ErrorKind,
    /// Operation label (e.g., "fetch_page")
    pub operation: String,
    /// Attempts made before giving up
    pub attempts: u32,
    /// HTTP status of the last failure, if any
    pub status: Option<u16>,
    /// Detail of the last failure
    pub message: String,
}

impl TerminalError {
    /// Wrap the last failure of an operation.
    pub fn from_failure(operation: &str, failure: FetchFailure, attempts: u32) -> Self {
        Self {
            kind: failure.kind,
            operation: operation.to_string(),
            attempts,
            status: failure.status,
            message: failure.message,
        }
    }

    /// Operation abandoned because shutdown was requested.
    pub fn interrupted(operation: &str, attempts: u32) -> Self {
        Self::from_failure(operation, FetchFailure::interrupted(), attempts)
    }

    /// Whether the failure was caused by a shutdown request.
    pub fn is_interrupted(&self) -> bool {
        self.kind == ErrorKind::Interrupted
    }
}

/// Parse a `Retry-After` header value.
///
/// Accepts delta-seconds (`"120"`) and HTTP-dates
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). A date in the past yields a zero wait.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    parse_retry_after_at(value, Utc::now())
}

/// [`parse_retry_after`] against an explicit "now".
pub fn parse_retry_after_at(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
