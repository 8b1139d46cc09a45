//! Core types for heliowatch.
//!
//! This crate provides the foundational types shared by the store and client crates:
//! - Report model ([`Record`], [`ReportDraft`], [`RecordId`], [`Severity`])
//! - The record index stored under the well-known index key
//! - Record and payload codecs with a pluggable [`PayloadCipher`]
//! - Record identifier generation
//! - Draft validation
//! - Configuration structs
//! - Error types using snafu

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod id;
pub mod index;
pub mod record;
pub mod validation;

pub use codec::{CodecError, DecodedRecord, MarkerCipher, PayloadCipher, RecordCodec};
pub use index::RecordIndex;
pub use record::{ImpactCategory, Record, RecordId, ReportDraft, Severity};
pub use validation::{ValidationError, validate_draft};
