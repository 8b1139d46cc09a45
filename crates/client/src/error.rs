//! Client error types.
//!
//! - [`SyncError`]: a whole synchronisation pass failed
//! - [`SubmitError`]: a submission ended in the error state
//! - [`SignerError`]: the identity collaborator did not authorise a write
//!
//! Per-record read and decode failures are not errors at this level; they
//! are reported as [`SkippedRecord`](crate::SkippedRecord)s inside a snapshot.

use std::fmt;

use heliowatch_kv::StoreError;
use heliowatch_types::{CodecError, ValidationError, id::IdError};
use snafu::Snafu;

/// Which of the two submission writes an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WritePhase {
    /// Writing the record entry.
    Data,
    /// Re-reading and overwriting the index.
    Index,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Index => f.write_str("index"),
        }
    }
}

/// Failure of one synchronisation pass.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SyncError {
    /// The ledger reported that it is not serving. No reads were attempted.
    #[snafu(display("Ledger service is unavailable"))]
    ServiceUnavailable,

    /// The availability probe itself failed.
    #[snafu(display("Ledger availability check failed: {source}"))]
    AvailabilityProbe {
        /// Underlying store error.
        source: StoreError,
    },

    /// The index could not be read or decoded.
    #[snafu(display("Record index unavailable: {source}"))]
    IndexUnavailable {
        /// Underlying store error.
        source: StoreError,
    },
}

impl SyncError {
    /// Returns true if running the same synchronisation again could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ServiceUnavailable => true,
            Self::AvailabilityProbe { source } | Self::IndexUnavailable { source } => {
                source.is_retryable()
            },
        }
    }
}

/// Failure reported by a [`Signer`](crate::Signer).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SignerError {
    /// The identity holder explicitly declined the write.
    #[snafu(display("User rejected transaction: {message}"))]
    Declined {
        /// Reason given by the signer.
        message: String,
    },

    /// The signer could not be reached or has no identity loaded.
    #[snafu(display("Signer unavailable: {message}"))]
    Unavailable {
        /// Error description.
        message: String,
    },
}

/// Failure of one submission.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SubmitError {
    /// The draft failed validation. No ledger call was made.
    #[snafu(display("Invalid report: {source}"))]
    Validation {
        /// Validation failure.
        source: ValidationError,
    },

    /// No identifier could be generated.
    #[snafu(display("Failed to generate record id: {source}"))]
    Identifier {
        /// Generator failure.
        source: IdError,
    },

    /// The draft or record could not be encoded.
    #[snafu(display("Failed to encode report: {source}"))]
    Encode {
        /// Codec failure.
        source: CodecError,
    },

    /// A ledger write (or the fresh index read) failed.
    #[snafu(display("Failed to write {phase}: {source}"))]
    StoreWrite {
        /// Which write failed.
        phase: WritePhase,
        /// Underlying store error.
        source: StoreError,
    },

    /// The submitting identity declined to authorise a write.
    #[snafu(display("Transaction rejected by user during {phase} write: {message}"))]
    UserRejected {
        /// Which write was declined.
        phase: WritePhase,
        /// Reason given by the signer.
        message: String,
    },

    /// The signer failed for a reason other than an explicit decline.
    #[snafu(display("Signer failed during {phase} write: {source}"))]
    Signer {
        /// Which write needed authorisation.
        phase: WritePhase,
        /// Signer failure.
        source: SignerError,
    },
}

impl SubmitError {
    /// Returns the write phase involved, if the failure happened at a write.
    #[must_use]
    pub fn phase(&self) -> Option<WritePhase> {
        match self {
            Self::StoreWrite { phase, .. }
            | Self::UserRejected { phase, .. }
            | Self::Signer { phase, .. } => Some(*phase),
            Self::Validation { .. } | Self::Identifier { .. } | Self::Encode { .. } => None,
        }
    }

    /// Returns true if the submitting identity declined the write.
    #[must_use]
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected { .. })
    }

    /// Returns the message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        if self.is_user_rejection() {
            "Transaction rejected by user".to_owned()
        } else {
            format!("Submission failed: {self}")
        }
    }

    /// Maps a store error at `phase`, lifting ledger-side rejections to [`Self::UserRejected`].
    pub(crate) fn at_phase(phase: WritePhase, source: StoreError) -> Self {
        if source.is_rejection() {
            let message = match &source {
                StoreError::Ledger { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            return Self::UserRejected { phase, message };
        }
        Self::StoreWrite { phase, source }
    }

    /// Maps a signer error at `phase`.
    pub(crate) fn from_signer(phase: WritePhase, source: SignerError) -> Self {
        match source {
            SignerError::Declined { message } => Self::UserRejected { phase, message },
            other => Self::Signer { phase, source: other },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use heliowatch_kv::LedgerError;

    use super::*;

    #[test]
    fn test_ledger_rejection_becomes_user_rejected() {
        let store = StoreError::Ledger {
            key: "spaceweather_sw-1".to_owned(),
            source: LedgerError::Rejected { message: "user rejected transaction".to_owned() },
        };
        let err = SubmitError::at_phase(WritePhase::Data, store);
        assert!(err.is_user_rejection());
        assert_eq!(err.phase(), Some(WritePhase::Data));
        assert_eq!(err.user_message(), "Transaction rejected by user");
    }

    #[test]
    fn test_timeout_stays_store_write() {
        let store = StoreError::Timeout { key: "spaceweather_keys".to_owned(), duration_ms: 10 };
        let err = SubmitError::at_phase(WritePhase::Index, store);
        assert!(matches!(err, SubmitError::StoreWrite { phase: WritePhase::Index, .. }));
        assert!(err.user_message().starts_with("Submission failed: Failed to write index"));
    }

    #[test]
    fn test_signer_decline_becomes_user_rejected() {
        let err = SubmitError::from_signer(
            WritePhase::Index,
            SignerError::Declined { message: "no".to_owned() },
        );
        assert!(matches!(err, SubmitError::UserRejected { phase: WritePhase::Index, .. }));

        let err = SubmitError::from_signer(
            WritePhase::Data,
            SignerError::Unavailable { message: "locked".to_owned() },
        );
        assert!(matches!(err, SubmitError::Signer { .. }));
        assert!(!err.is_user_rejection());
    }

    #[test]
    fn test_sync_error_retryability() {
        assert!(SyncError::ServiceUnavailable.is_retryable());
        let malformed = StoreError::MalformedIndex {
            key: "spaceweather_keys".to_owned(),
            source: heliowatch_types::RecordIndex::from_bytes(b"{").unwrap_err(),
        };
        assert!(!SyncError::IndexUnavailable { source: malformed }.is_retryable());
    }
}
