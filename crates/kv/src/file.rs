//! File-backed ledger for local use.
//!
//! Stores the whole key space as one JSON object mapping keys to base64
//! values. Every write rewrites the file through a uniquely named temporary
//! sibling and a rename, so a crash or a concurrent writer leaves either the
//! old or a complete new file. Access is serialised within one process only;
//! two processes sharing a file race exactly like two submitters sharing a
//! remote ledger.

use std::{
    collections::BTreeMap,
    io::Write as _,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio::sync::Mutex;

use crate::{
    error::{LedgerError, TransportSnafu},
    ledger::{KeyValueLedger, WriteReceipt},
};

/// [`KeyValueLedger`] persisted to a single JSON file.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    lock: Mutex<()>,
    writes: AtomicU64,
}

impl FileLedger {
    /// Opens (lazily) the ledger file at `path`. A missing file is an empty ledger.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()), writes: AtomicU64::new(0) }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, LedgerError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| TransportSnafu {
                message: format!("corrupt ledger file {}: {e}", self.path.display()),
            }
            .build()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => TransportSnafu {
                message: format!("failed to read {}: {e}", self.path.display()),
            }
            .fail(),
        }
    }

    async fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| TransportSnafu {
            message: format!("failed to encode ledger file: {e}"),
        }
        .build())?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || replace_file(&path, &bytes)).await.map_err(|e| {
            TransportSnafu { message: format!("ledger write task failed: {e}") }.build()
        })?
    }
}

/// Writes `bytes` to a uniquely named sibling of `path`, then renames it over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), LedgerError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(|e| TransportSnafu {
                message: format!("failed to create {}: {e}", parent.display()),
            }
            .build())?;
            parent
        },
        None => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| TransportSnafu {
        message: format!("failed to create temporary file in {}: {e}", dir.display()),
    }
    .build())?;
    tmp.write_all(bytes).map_err(|e| TransportSnafu {
        message: format!("failed to write {}: {e}", tmp.path().display()),
    }
    .build())?;
    tmp.persist(path).map_err(|e| TransportSnafu {
        message: format!("failed to replace {}: {}", path.display(), e.error),
    }
    .build())?;
    Ok(())
}

#[async_trait]
impl KeyValueLedger for FileLedger {
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        match entries.get(key) {
            Some(encoded) => STANDARD.decode(encoded).map_err(|e| TransportSnafu {
                message: format!("corrupt value for {key}: {e}"),
            }
            .build()),
            None => Ok(Vec::new()),
        }
    }

    async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt, LedgerError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_owned(), STANDARD.encode(value));
        self.store(&entries).await?;
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(key, path = %self.path.display(), "ledger file updated");
        Ok(WriteReceipt::new(format!("file-tx-{n}")))
    }

    async fn is_available(&self) -> Result<bool, LedgerError> {
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("ledger.json"));
        assert!(ledger.get_data("anything").await.unwrap().is_empty());
        assert!(ledger.is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_values_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        let first = FileLedger::new(&path);
        first.set_data("k", vec![0, 159, 146, 150]).await.unwrap();
        first.set_data("j", b"text".to_vec()).await.unwrap();

        let second = FileLedger::new(&path);
        assert_eq!(second.get_data("k").await.unwrap(), vec![0, 159, 146, 150]);
        assert_eq!(second.get_data("j").await.unwrap(), b"text");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{broken").unwrap();
        let ledger = FileLedger::new(&path);
        assert!(matches!(ledger.get_data("k").await, Err(LedgerError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_writers_leave_a_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let writers = (0..8).map(|i| {
            let ledger = FileLedger::new(&path);
            tokio::spawn(async move { ledger.set_data(&format!("k{i}"), vec![i; 256]).await })
        });
        for writer in writers.collect::<Vec<_>>() {
            writer.await.unwrap().unwrap();
        }

        let stored = std::fs::read(&path).unwrap();
        let entries: BTreeMap<String, String> = serde_json::from_slice(&stored).unwrap();
        assert!(!entries.is_empty());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "ledger.json")
            .collect();
        assert!(leftovers.is_empty(), "temporary files left behind: {leftovers:?}");
    }
}
