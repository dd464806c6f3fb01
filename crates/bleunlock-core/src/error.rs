//! Error types for the bleunlock core library.
//!
//! Two layers live here:
//!
//! - [`StoreError`] is the internal taxonomy for talking to a SQLite store.
//!   The public lookup operations never return it; they log it and report
//!   absence instead.
//! - [`BleUnlockError`] is the unified error for the outer surfaces (store
//!   provisioning, the HTTP API) and carries HTTP status codes and
//!   machine-readable error codes. Configuration has its own
//!   [`ConfigError`](crate::config::ConfigError).
//!
//! # Example
//!
//! ```rust
//! use bleunlock_core::error::{BleUnlockError, Result};
//!
//! fn require_day_key(day: &str) -> Result<()> {
//!     if day.len() != 8 {
//!         return Err(BleUnlockError::InvalidDayKey(day.to_string()));
//!     }
//!     Ok(())
//! }
//! # assert!(require_day_key("2025").is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Failure while talking to one SQLite store.
///
/// "No matching row" is not an error (it is `Ok(None)`), and a column holding
/// the wrong storage class is an absent field rather than an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file is missing or could not be opened.
    #[error("{store} store unavailable at {}", .path.display())]
    Unavailable {
        /// Short store label (e.g. `paired`).
        store: &'static str,
        /// Path that was tried.
        path: PathBuf,
    },

    /// The statement was rejected, usually because the schema does not match.
    #[error("failed to prepare statement: {0}")]
    Prepare(#[source] rusqlite::Error),

    /// The statement prepared but failed while running.
    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),
}

/// Result alias for store access.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The unified error type for bleunlock operations.
#[derive(Debug, Error)]
pub enum BleUnlockError {
    // =========================================================================
    // STORE ERRORS
    // =========================================================================
    /// A store file is missing or could not be opened.
    #[error("The {store} store is unavailable at {}. Check that the file exists and is readable.", .path.display())]
    StoreUnavailable {
        /// Short store label.
        store: &'static str,
        /// Path that was tried.
        path: PathBuf,
    },

    /// A statement could not be prepared against the store.
    #[error("Store query could not be prepared: {0}")]
    QueryPrepareFailed(String),

    /// A statement failed while executing.
    #[error("Store query failed: {0}")]
    QueryFailed(String),

    // =========================================================================
    // LOOKUP OUTCOMES
    // =========================================================================
    /// No known device carries this identifier.
    #[error("Device not found: '{0}'. It is in neither the paired nor the other devices store.")]
    DeviceNotFound(String),

    /// No event was logged under this day key.
    #[error("No lock event recorded for day '{0}'")]
    EventNotFound(String),

    /// The day key is not an eight-digit `yyyyMMdd` string.
    #[error("Invalid day key: '{0}'. Expected 'yyyyMMdd' (e.g., '20250115').")]
    InvalidDayKey(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for bleunlock operations.
pub type Result<T> = std::result::Result<T, BleUnlockError>;

impl BleUnlockError {
    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidDayKey(_) => 400,

            Self::DeviceNotFound(_) | Self::EventNotFound(_) => 404,

            Self::QueryPrepareFailed(_) | Self::QueryFailed(_) | Self::IoError(_) => 500,

            Self::StoreUnavailable { .. } => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::QueryPrepareFailed(_) => "QUERY_PREPARE_FAILED",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::InvalidDayKey(_) => "INVALID_DAY_KEY",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<StoreError> for BleUnlockError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { store, path } => Self::StoreUnavailable { store, path },
            StoreError::Prepare(e) => Self::QueryPrepareFailed(e.to_string()),
            StoreError::Query(e) => Self::QueryFailed(e.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    fn unavailable() -> BleUnlockError {
        BleUnlockError::StoreUnavailable {
            store: "paired",
            path: PathBuf::from("/nonexistent/paired.db"),
        }
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(BleUnlockError::InvalidDayKey("x".into()).http_status_code(), 400);
        assert_eq!(BleUnlockError::DeviceNotFound("x".into()).http_status_code(), 404);
        assert_eq!(BleUnlockError::EventNotFound("x".into()).http_status_code(), 404);
        assert_eq!(BleUnlockError::QueryFailed("e".into()).http_status_code(), 500);
        assert_eq!(unavailable().http_status_code(), 503);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(unavailable().error_code(), "STORE_UNAVAILABLE");
        assert_eq!(
            BleUnlockError::DeviceNotFound("x".into()).error_code(),
            "DEVICE_NOT_FOUND"
        );
        assert_eq!(
            BleUnlockError::InvalidDayKey("x".into()).error_code(),
            "INVALID_DAY_KEY"
        );
    }

    #[test]
    fn test_from_store_error() {
        let err: BleUnlockError = StoreError::Unavailable {
            store: "event log",
            path: PathBuf::from("/tmp/TimeLog.db"),
        }
        .into();
        assert!(matches!(err, BleUnlockError::StoreUnavailable { store: "event log", .. }));

        let err: BleUnlockError = StoreError::Prepare(rusqlite::Error::InvalidQuery).into();
        assert!(matches!(err, BleUnlockError::QueryPrepareFailed(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: BleUnlockError = io_err.into();
        assert!(matches!(err, BleUnlockError::IoError(_)));
    }

    #[test]
    fn test_error_display_messages() {
        assert!(unavailable().to_string().contains("/nonexistent/paired.db"));
        assert!(BleUnlockError::DeviceNotFound("ABCD-1234".into())
            .to_string()
            .contains("ABCD-1234"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BleUnlockError>();
        assert_sync::<BleUnlockError>();
        assert_send::<StoreError>();
    }
}
