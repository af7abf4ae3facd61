//! Error types for the reconciler crate.

use clanwatch_ledger::LedgerError;
use clanwatch_roster::FetchError;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The roster source permanently rejected the request.
    #[error("fatal fetch error: {0}")]
    FatalFetch(FetchError),

    /// The ledger could not open or commit a cycle.
    #[error("persistence failed: {reason}")]
    Persistence { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a persistence error.
    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this error should end the process.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalFetch(_) | Self::InvalidConfig { .. })
    }
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        Self::persistence(err.to_string())
    }
}

/// Notification delivery failure. Logged by the caller and otherwise ignored.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {reason}")]
    Transport { reason: String },

    #[error("notification endpoint rejected the message (HTTP {status})")]
    Rejected { status: u16 },
}

impl NotifyError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        Self::transport(err.to_string())
    }
}
