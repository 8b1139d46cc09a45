//! Record serialisation.
//!
//! Two layers are involved in turning a report into ledger bytes:
//!
//! - A [`PayloadCipher`] seals the submitter's draft into an opaque payload string. The only
//!   implementation shipped here, [`MarkerCipher`], tags a reversible base64 encoding with a
//!   protected-content marker. It is a placeholder: a real confidential-computation backend plugs
//!   in through the same trait.
//! - The record envelope is the JSON object stored under a record key. It carries the payload
//!   alongside the clear fields the read side filters and aggregates on.
//!
//! Envelope decoding returns a [`DecodedRecord`] rather than an error so that a
//! reader walking many records can skip malformed ones with a plain `match`.

use std::{fmt, sync::Arc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::record::{Record, RecordId, ReportDraft, Severity};

/// Prefix identifying a payload as protected content.
pub const PROTECTED_MARKER: &str = "FHE-";

/// Error type for codec operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    /// JSON encoding failed.
    #[snafu(display("Encoding failed: {source}"))]
    EncodeJson {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// JSON decoding failed (malformed or truncated input).
    #[snafu(display("Decoding failed: {source}"))]
    DecodeJson {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Stored bytes are not UTF-8 text.
    #[snafu(display("Decoding failed: value is not UTF-8: {source}"))]
    Utf8 {
        /// The underlying UTF-8 error.
        source: std::str::Utf8Error,
    },

    /// Payload does not carry the protected-content marker.
    #[snafu(display("Decoding failed: payload lacks the {marker:?} marker"))]
    MissingMarker {
        /// The marker that was expected.
        marker: &'static str,
    },

    /// Payload body is not valid base64.
    #[snafu(display("Decoding failed: payload body is not base64: {source}"))]
    Base64 {
        /// The underlying base64 error.
        source: base64::DecodeError,
    },

    /// An envelope field holds a value outside its domain.
    #[snafu(display("Decoding failed: field {field}: {message}"))]
    InvalidField {
        /// Wire name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

// ============================================================================
// Payload cipher
// ============================================================================

/// Pluggable protection for the report payload.
///
/// `open(seal(draft))` must return `draft` unchanged. Implementations own the
/// confidentiality guarantee; nothing else in the system inspects payloads.
pub trait PayloadCipher: Send + Sync + fmt::Debug {
    /// Seals a draft into an opaque, self-describing payload string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the draft cannot be serialised.
    fn seal(&self, draft: &ReportDraft) -> Result<String, CodecError>;

    /// Recovers the draft from a payload produced by [`Self::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] on malformed or truncated payloads.
    fn open(&self, payload: &str) -> Result<ReportDraft, CodecError>;
}

/// Marker-tagging placeholder cipher: `"FHE-" + base64(json(draft))`.
///
/// Provides no confidentiality. The encoding is reversible by anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerCipher;

impl PayloadCipher for MarkerCipher {
    fn seal(&self, draft: &ReportDraft) -> Result<String, CodecError> {
        let json = serde_json::to_vec(draft).context(EncodeJsonSnafu)?;
        Ok(format!("{PROTECTED_MARKER}{}", STANDARD.encode(json)))
    }

    fn open(&self, payload: &str) -> Result<ReportDraft, CodecError> {
        let body = payload
            .strip_prefix(PROTECTED_MARKER)
            .ok_or(CodecError::MissingMarker { marker: PROTECTED_MARKER })?;
        let json = STANDARD.decode(body).context(Base64Snafu)?;
        serde_json::from_slice(&json).context(DecodeJsonSnafu)
    }
}

// ============================================================================
// Record envelope
// ============================================================================

/// Wire layout of a record value.
///
/// Field names are fixed by records already on the ledger.
#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope {
    data: String,
    timestamp: i64,
    provider: String,
    severity: i64,
    #[serde(rename = "impactType")]
    impact_type: String,
    location: String,
}

/// Outcome of decoding one stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRecord {
    /// The value decoded into a well-formed record.
    Decoded(Record),
    /// The value could not be decoded; the reason is human-readable.
    Malformed(String),
}

impl DecodedRecord {
    /// Returns the record if decoding succeeded.
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Decoded(record) => Some(record),
            Self::Malformed(_) => None,
        }
    }
}

/// Serialises records to and from the bytes stored under record keys.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    cipher: Arc<dyn PayloadCipher>,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(Arc::new(MarkerCipher))
    }
}

impl RecordCodec {
    /// Creates a codec sealing payloads with `cipher`.
    pub fn new(cipher: Arc<dyn PayloadCipher>) -> Self {
        Self { cipher }
    }

    /// Seals a draft into its protected payload.
    ///
    /// # Errors
    ///
    /// Propagates the cipher's [`CodecError`].
    pub fn encode(&self, draft: &ReportDraft) -> Result<String, CodecError> {
        self.cipher.seal(draft)
    }

    /// Opens a protected payload back into the draft it was sealed from.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] on malformed or truncated payloads.
    pub fn decode(&self, payload: &str) -> Result<ReportDraft, CodecError> {
        self.cipher.open(payload)
    }

    /// Serialises a record envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EncodeJson`] if serialisation fails.
    pub fn encode_record(&self, record: &Record) -> Result<Vec<u8>, CodecError> {
        let envelope = RecordEnvelope {
            data: record.encoded_payload.clone(),
            timestamp: record.timestamp,
            provider: record.submitter_id.clone(),
            severity: i64::from(record.severity.value()),
            impact_type: record.impact_category.clone(),
            location: record.location.clone(),
        };
        serde_json::to_vec(&envelope).context(EncodeJsonSnafu)
    }

    /// Parses a record envelope stored under `id`.
    ///
    /// The payload is carried through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the bytes are not a well-formed envelope or
    /// the severity lies outside `1..=5`.
    pub fn try_decode_record(&self, id: &RecordId, bytes: &[u8]) -> Result<Record, CodecError> {
        let text = std::str::from_utf8(bytes).context(Utf8Snafu)?;
        let envelope: RecordEnvelope = serde_json::from_str(text).context(DecodeJsonSnafu)?;
        let severity = u8::try_from(envelope.severity)
            .ok()
            .and_then(Severity::new)
            .ok_or_else(|| CodecError::InvalidField {
                field: "severity",
                message: format!("{} outside 1..=5", envelope.severity),
            })?;

        Ok(Record {
            id: id.clone(),
            encoded_payload: envelope.data,
            timestamp: envelope.timestamp,
            submitter_id: envelope.provider,
            severity,
            impact_category: envelope.impact_type,
            location: envelope.location,
        })
    }

    /// Parses a record envelope, folding failures into [`DecodedRecord::Malformed`].
    pub fn decode_record(&self, id: &RecordId, bytes: &[u8]) -> DecodedRecord {
        match self.try_decode_record(id, bytes) {
            Ok(record) => DecodedRecord::Decoded(record),
            Err(e) => DecodedRecord::Malformed(e.to_string()),
        }
    }
}
