//! Ledger errors.
//!
//! Every variant carries the message the backend produced, so a failed cycle
//! can be logged and reported without losing the store's own diagnosis.

use std::fmt;

use clanwatch_core::Tag;
use thiserror::Error;

/// A ledger operation that did not complete.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The store could not be opened, or stopped answering in time.
    #[error("ledger store unreachable: {message}")]
    ConnectionFailed { message: String },

    /// A read or a staged statement was refused by the store.
    #[error("ledger query failed: {message}")]
    QueryFailed { message: String },

    /// A cycle referenced a member the ledger holds no record for.
    #[error("no ledger record for member {tag}")]
    NotFound { tag: Tag },

    /// A record could not be encoded for, or decoded from, the store.
    #[error("ledger record encoding failed: {message}")]
    SerializationError { message: String },

    /// The cycle's writes were rolled back.
    #[error("ledger cycle not committed: {message}")]
    TransactionFailed { message: String },
}

impl LedgerError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    /// No record exists for `tag`.
    pub fn missing_member(tag: &Tag) -> Self {
        Self::NotFound { tag: tag.clone() }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn transaction_failed(message: impl Into<String>) -> Self {
        Self::TransactionFailed {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Classify a SurrealDB error by its message.
///
/// Timeouts count as the store being unreachable.
pub fn from_surrealdb_error(err: impl fmt::Display) -> LedgerError {
    let message = err.to_string();
    let lower = message.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("connect") {
        LedgerError::connection_failed(message)
    } else if lower.contains("transaction") {
        LedgerError::transaction_failed(message)
    } else if lower.contains("serializ") {
        LedgerError::serialization(message)
    } else {
        LedgerError::query_failed(message)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_missing_member_names_the_tag() {
        let err = LedgerError::missing_member(&Tag::new("#ABC").unwrap());
        assert!(matches!(err, LedgerError::NotFound { .. }));
        assert_eq!(err.to_string(), "no ledger record for member #ABC");
    }

    #[test]
    fn test_timeout_keeps_backend_message() {
        let err = from_surrealdb_error("Query timeout after 30s on member table");
        assert!(matches!(err, LedgerError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("after 30s on member table"));
    }

    #[test]
    fn test_from_surrealdb_error_categories() {
        assert!(matches!(
            from_surrealdb_error("Connection refused (os error 111)"),
            LedgerError::ConnectionFailed { .. }
        ));
        assert!(matches!(
            from_surrealdb_error("Transaction conflict: resource busy"),
            LedgerError::TransactionFailed { .. }
        ));
        assert!(matches!(
            from_surrealdb_error("Failed to deserialize field `tag`"),
            LedgerError::SerializationError { .. }
        ));

        let err = from_surrealdb_error("Parse error: unexpected token");
        assert!(matches!(err, LedgerError::QueryFailed { .. }));
        assert!(err.to_string().ends_with("Parse error: unexpected token"));
    }

    #[test]
    fn test_serde_error_converts() {
        let err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        assert!(matches!(
            LedgerError::from(err),
            LedgerError::SerializationError { .. }
        ));
    }
}
