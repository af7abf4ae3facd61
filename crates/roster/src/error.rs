//! Fetch error classification.

use thiserror::Error;

/// Result type for roster fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Coarse classification of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Upstream temporarily unavailable; retry on the next tick.
    Transient,
    /// Bad credentials or permanent rejection; report to the operator.
    Fatal,
}

/// Errors that can occur while fetching a roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The roster service is temporarily unavailable.
    #[error("roster service unavailable{}: {reason}", status_suffix(*status))]
    Transient { status: Option<u16>, reason: String },

    /// The roster service rejected the request permanently.
    #[error("roster request rejected{}: {reason}", status_suffix(*status))]
    Fatal { status: Option<u16>, reason: String },
}

fn status_suffix(status: Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

impl FetchError {
    /// Create a transient error.
    pub fn transient(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Transient {
            status,
            reason: reason.into(),
        }
    }

    /// Create a fatal error.
    pub fn fatal(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Fatal {
            status,
            reason: reason.into(),
        }
    }

    /// Classify an HTTP status code returned by the roster service.
    ///
    /// `429` and `5xx` are transient; every other non-success status is fatal.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        if status == 429 || (500..600).contains(&status) {
            Self::transient(Some(status), reason)
        } else {
            Self::fatal(Some(status), reason)
        }
    }

    /// Get the error kind.
    #[must_use]
    pub const fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Transient { .. } => FetchErrorKind::Transient,
            Self::Fatal { .. } => FetchErrorKind::Fatal,
        }
    }

    /// Get the HTTP status code, if the failure carried one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Fatal { status, .. } => *status,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());

        if err.is_builder() {
            Self::fatal(status, format!("invalid request: {err}"))
        } else if let Some(code) = status {
            Self::from_status(code, err.to_string())
        } else {
            // connect, timeout, body and decode failures
            Self::transient(None, err.to_string())
        }
    }
}
