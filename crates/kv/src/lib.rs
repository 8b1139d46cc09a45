//! Ledger access for heliowatch.
//!
//! The ledger is a flat key-value service without enumeration. This crate
//! provides:
//! - [`KeyValueLedger`]: the three-call ledger interface
//! - [`KeyIndexStore`]: the record/index layout on top of it, with per-call time bounds
//! - [`MemoryLedger`]: a controllable in-process ledger for tests
//! - [`FileLedger`]: a single-file ledger for local use
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use heliowatch_kv::{KeyIndexStore, MemoryLedger};
//!
//! # async fn example() -> heliowatch_kv::Result<()> {
//! let store = KeyIndexStore::new(Arc::new(MemoryLedger::new()));
//! store.write_record(&"sw-1".into(), br#"{"data":"FHE-"}"#.to_vec()).await?;
//! let index = store.append_to_index(&"sw-1".into()).await?;
//! assert_eq!(index.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod index_store;
mod ledger;
mod memory;

pub use error::{LedgerError, Result, StoreError};
pub use file::FileLedger;
pub use index_store::KeyIndexStore;
pub use ledger::{KeyValueLedger, WriteReceipt};
pub use memory::MemoryLedger;

