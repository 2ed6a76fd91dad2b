//! Error types for readthrough.
//!
//! The read path surfaces very few errors on purpose: a caller either gets a
//! value (fresh or stale) or learns that no value could be produced. Store
//! and source failures are absorbed by the orchestrator and only show up in
//! logs and metrics.
//!
//! # Example
//!
//! ```
//! use readthrough_core::{CacheError, CacheKey};
//!
//! let err = CacheKey::new("").unwrap_err();
//! assert!(err.is_invalid_key());
//! ```

use std::time::Duration;
use thiserror::Error;

/// Errors returned to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key was empty. Nothing was read, locked or fetched.
    #[error("cache key cannot be empty")]
    InvalidKey,

    /// No value, fresh or stale, could be produced within the wait bound.
    #[error("no value for '{key}' after waiting {waited:?} for the refresh lock")]
    AcquireTimeout {
        /// Key that could not be populated
        key: String,
        /// How long the caller waited for exclusive access
        waited: Duration,
    },

    /// A store operation failed on an explicit management call.
    ///
    /// The read path never returns this variant.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Creates an AcquireTimeout error.
    pub fn acquire_timeout(key: impl Into<String>, waited: Duration) -> Self {
        Self::AcquireTimeout {
            key: key.into(),
            waited,
        }
    }

    /// Returns true if the key was rejected before any work happened.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey)
    }

    /// Returns true if the caller gave up waiting for a value.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::AcquireTimeout { .. })
    }
}

/// Errors reported by a [`Storage`](crate::Storage) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored value cannot be produced as the requested type.
    #[error("value stored under '{key}' is not a {expected}")]
    TypeMismatch {
        /// Key that was read
        key: String,
        /// Type name the caller asked for
        expected: &'static str,
    },

    /// The backend could not be reached.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Description of what went wrong
        reason: String,
    },

    /// The backend refused a write.
    #[error("store rejected write for '{key}': {reason}")]
    Rejected {
        /// Key being written
        key: String,
        /// Why the write was refused
        reason: String,
    },
}

impl StoreError {
    /// Creates a TypeMismatch error for the requested type `T`.
    pub fn type_mismatch<T>(key: impl Into<String>) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Creates an Unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a Rejected error.
    pub fn rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::Unavailable { .. } => "unavailable",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Type alias for Results with CacheError.
pub type Result<T> = std::result::Result<T, CacheError>;
