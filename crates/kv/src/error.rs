//! Store error types.
//!
//! Provides a two-tier error model:
//! - [`LedgerError`]: what a [`KeyValueLedger`](crate::KeyValueLedger) implementation reports for
//!   one call (transport failure, service down, write declined)
//! - [`StoreError`]: what [`KeyIndexStore`](crate::KeyIndexStore) reports, carrying the key
//!   involved and separating timeouts and index decoding failures
//!
//! Nothing in this crate retries. [`StoreError::is_retryable`] only classifies.

use heliowatch_types::CodecError;
use snafu::{Location, Snafu};

/// Result type alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Failure reported by a ledger implementation for a single call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LedgerError {
    /// The request could not be delivered or its response was lost.
    #[snafu(display("Transport error at {location}: {message}"))]
    Transport {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// The ledger service refused the call because it is not serving.
    #[snafu(display("Ledger unavailable: {message}"))]
    Unavailable {
        /// Error description.
        message: String,
    },

    /// The signing identity declined to authorise a write.
    #[snafu(display("Write rejected by signer: {message}"))]
    Rejected {
        /// Rejection reason as reported by the signer.
        message: String,
    },
}

/// Errors from [`KeyIndexStore`](crate::KeyIndexStore) operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// A ledger call failed.
    #[snafu(display("Ledger call for key {key:?} failed: {source}"))]
    Ledger {
        /// Key the call addressed.
        key: String,
        /// Underlying ledger error.
        source: LedgerError,
    },

    /// A ledger call did not complete within the configured bound.
    #[snafu(display("Ledger call for key {key:?} timed out after {duration_ms}ms"))]
    Timeout {
        /// Key the call addressed.
        key: String,
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// The index value exists but is not a JSON array of ids.
    #[snafu(display("Index under {key:?} is malformed: {source}"))]
    MalformedIndex {
        /// Index key.
        key: String,
        /// Decoding failure.
        source: CodecError,
    },

    /// The index could not be serialised for writing.
    #[snafu(display("Failed to encode index: {source}"))]
    EncodeIndex {
        /// Encoding failure.
        source: CodecError,
    },
}

impl StoreError {
    /// Returns true if repeating the same call could succeed.
    ///
    /// Timeouts and transport or availability failures are transient.
    /// Rejections and malformed data are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger { source, .. } => matches!(
                source,
                LedgerError::Transport { .. } | LedgerError::Unavailable { .. }
            ),
            Self::Timeout { .. } => true,
            Self::MalformedIndex { .. } => false,
            Self::EncodeIndex { .. } => false,
        }
    }

    /// Returns true if the signer declined the write.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Ledger { source: LedgerError::Rejected { .. }, .. })
    }

    /// Returns the key involved, if the error concerns a single key.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Ledger { key, .. }
            | Self::Timeout { key, .. }
            | Self::MalformedIndex { key, .. } => Some(key),
            Self::EncodeIndex { .. } => None,
        }
    }
}
