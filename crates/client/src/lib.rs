//! Client core for heliowatch.
//!
//! Turns the flat ledger into a browsable report list and publishes new
//! reports onto it:
//!
//! - [`SyncEngine`]: reads the index and every indexed record into a [`Snapshot`]
//! - [`SubmissionPipeline`]: validates, encodes and writes a report, then refreshes
//! - [`ViewProjector`]: filters a snapshot and computes [`Stats`]
//! - [`Signer`]: the identity collaborator that authorises writes
//! - [`Reporter`]: one handle over all of the above
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use heliowatch_client::{Reporter, StaticSigner, ViewQuery};
//! use heliowatch_kv::MemoryLedger;
//! use heliowatch_types::{ReportDraft, config::HeliowatchConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reporter = Reporter::from_config(
//!     Arc::new(MemoryLedger::new()),
//!     Arc::new(StaticSigner::new("0x71c7656ec7ab88b098defb751b7401b5f6d8976f")),
//!     &HeliowatchConfig::default(),
//! );
//! reporter.submit(ReportDraft::new(4, "Power Grid", "Texas")).await?;
//! let model = reporter.view(&ViewQuery::all().search("tex"));
//! assert_eq!(model.records.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod reporter;
mod signer;
mod submit;
mod sync;
mod view;

pub use error::{SignerError, SubmitError, SyncError, WritePhase};
pub use reporter::{RenderModel, Reporter};
pub use signer::{Signer, StaticSigner};
pub use submit::{
    PENDING_MESSAGE, SUCCESS_MESSAGE, SubmissionEvent, SubmissionPipeline, SubmissionReceipt,
    SubmissionState,
};
pub use sync::{SkipReason, SkippedRecord, Snapshot, SyncEngine};
pub use view::{Stats, Tab, ViewProjector, ViewQuery, abbreviate_identity};
