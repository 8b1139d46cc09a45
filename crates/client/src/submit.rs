//! Report submission.
//!
//! A submission walks `Idle -> Pending -> Success | Error` and falls back to
//! `Idle` after the configured display time. Every transition is published
//! as a [`SubmissionEvent`] on a broadcast channel.
//!
//! Publishing takes two ledger writes, in this order:
//!
//! 1. the record entry under its own key;
//! 2. the index, re-read and overwritten with the new id appended.
//!
//! If the first write fails the index is never touched. If the second fails
//! the record stays on the ledger but is not indexed, so no reader sees it.
//! See [`KeyIndexStore::append_to_index`](heliowatch_kv::KeyIndexStore::append_to_index)
//! for the race between concurrent submitters in step 2.

use std::{fmt, sync::Arc, time::Duration};

use heliowatch_types::{Record, RecordId, ReportDraft, config::SubmissionConfig, id, validate_draft};
use parking_lot::Mutex;
use snafu::ResultExt;
use tokio::sync::broadcast;

use crate::{
    error::{EncodeSnafu, IdentifierSnafu, SubmitError, SyncError, ValidationSnafu, WritePhase},
    signer::Signer,
    sync::{Snapshot, SyncEngine},
};

/// Message published when a submission starts.
pub const PENDING_MESSAGE: &str = "Encrypting space weather data...";

/// Message published when both writes succeeded.
pub const SUCCESS_MESSAGE: &str = "Encrypted data submitted securely!";

const EVENT_CAPACITY: usize = 16;

/// Submission states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubmissionState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Validating and writing.
    Pending,
    /// Both writes succeeded.
    Success,
    /// The submission failed.
    Error,
}

impl SubmissionState {
    /// Returns true for `Success` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEvent {
    /// Submission this transition belongs to. Increases with every `submit` call.
    pub generation: u64,
    /// State entered.
    pub state: SubmissionState,
    /// Human-readable status. Empty for `Idle`.
    pub message: String,
    /// Id of the published record, on `Success`.
    pub id: Option<RecordId>,
}

impl Default for SubmissionEvent {
    fn default() -> Self {
        Self { generation: 0, state: SubmissionState::Idle, message: String::new(), id: None }
    }
}

/// Result of a successful submission.
#[derive(Debug)]
pub struct SubmissionReceipt {
    /// Id of the published record.
    pub id: RecordId,
    /// The record as written.
    pub record: Record,
    /// Outcome of the synchronisation run after publishing.
    ///
    /// A failed refresh does not make the submission a failure.
    pub refresh: Result<Snapshot, SyncError>,
}

impl SubmissionReceipt {
    /// Returns the refreshed snapshot, if the refresh succeeded.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.refresh.as_ref().ok()
    }
}

struct Shared {
    engine: SyncEngine,
    signer: Arc<dyn Signer>,
    config: SubmissionConfig,
    current: Mutex<SubmissionEvent>,
    events: broadcast::Sender<SubmissionEvent>,
}

impl Shared {
    /// Starts a new submission and returns its generation.
    fn begin(&self) -> u64 {
        let mut current = self.current.lock();
        let generation = current.generation + 1;
        self.publish(&mut current, SubmissionEvent {
            generation,
            state: SubmissionState::Pending,
            message: PENDING_MESSAGE.to_owned(),
            id: None,
        });
        generation
    }

    /// Enters a terminal state unless a newer submission has started.
    fn finish(&self, generation: u64, state: SubmissionState, message: String, id: Option<RecordId>) {
        let mut current = self.current.lock();
        if current.generation != generation {
            return;
        }
        self.publish(&mut current, SubmissionEvent { generation, state, message, id });
    }

    /// Returns to `Idle` if `generation` is still current and terminal.
    fn reset(&self, generation: u64) {
        let mut current = self.current.lock();
        if current.generation != generation || !current.state.is_terminal() {
            return;
        }
        self.publish(&mut current, SubmissionEvent { generation, ..SubmissionEvent::default() });
    }

    fn publish(&self, current: &mut SubmissionEvent, event: SubmissionEvent) {
        tracing::info!(
            generation = event.generation,
            state = %event.state,
            message = %event.message,
            "submission state changed"
        );
        *current = event.clone();
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Validates, encodes and publishes reports.
///
/// Cloning yields another handle to the same pipeline and state.
#[derive(Clone)]
pub struct SubmissionPipeline {
    shared: Arc<Shared>,
}

impl fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("config", &self.shared.config)
            .field("current", &*self.shared.current.lock())
            .finish_non_exhaustive()
    }
}

impl SubmissionPipeline {
    /// Creates a pipeline with default submission settings.
    pub fn new(engine: SyncEngine, signer: Arc<dyn Signer>) -> Self {
        Self::with_config(engine, signer, SubmissionConfig::default())
    }

    /// Creates a pipeline with explicit submission settings.
    pub fn with_config(engine: SyncEngine, signer: Arc<dyn Signer>, config: SubmissionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                engine,
                signer,
                config,
                current: Mutex::new(SubmissionEvent::default()),
                events,
            }),
        }
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.shared.events.subscribe()
    }

    /// Returns the current state.
    pub fn state(&self) -> SubmissionState {
        self.shared.current.lock().state
    }

    /// Returns the most recent transition.
    pub fn last_event(&self) -> SubmissionEvent {
        self.shared.current.lock().clone()
    }

    /// Returns the submitting identity.
    pub fn identity(&self) -> String {
        self.shared.signer.identity()
    }

    /// Publishes `draft` and refreshes the snapshot.
    ///
    /// Must be called within a Tokio runtime: the return to `Idle` is a
    /// spawned timer.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] for invalid drafts (before any ledger call),
    /// failed or declined writes, and encoding failures.
    #[tracing::instrument(
        skip(self, draft),
        fields(severity = draft.severity, impact = %draft.impact_category)
    )]
    pub async fn submit(&self, draft: ReportDraft) -> Result<SubmissionReceipt, SubmitError> {
        let generation = self.shared.begin();

        match self.publish(&draft).await {
            Ok(record) => {
                let id = record.id.clone();
                self.shared.finish(
                    generation,
                    SubmissionState::Success,
                    SUCCESS_MESSAGE.to_owned(),
                    Some(id.clone()),
                );
                self.schedule_reset(generation, self.shared.config.success_display);

                let refresh = self.shared.engine.synchronize().await;
                if let Err(e) = &refresh {
                    tracing::warn!(id = %id, error = %e, "refresh after submission failed");
                }
                Ok(SubmissionReceipt { id, record, refresh })
            },
            Err(e) => {
                tracing::warn!(error = %e, phase = ?e.phase(), "submission failed");
                self.shared.finish(generation, SubmissionState::Error, e.user_message(), None);
                self.schedule_reset(generation, self.shared.config.error_display);
                Err(e)
            },
        }
    }

    async fn publish(&self, draft: &ReportDraft) -> Result<Record, SubmitError> {
        let severity = validate_draft(draft).context(ValidationSnafu)?;
        let engine = &self.shared.engine;
        let store = engine.store();
        let signer = &self.shared.signer;

        let id = id::generate(&self.shared.config.id_prefix).context(IdentifierSnafu)?;
        let record = Record {
            encoded_payload: engine.codec().encode(draft).context(EncodeSnafu)?,
            id,
            timestamp: chrono::Utc::now().timestamp(),
            submitter_id: signer.identity(),
            severity,
            impact_category: draft.impact_category.clone(),
            location: draft.location.clone(),
        };
        let bytes = engine.codec().encode_record(&record).context(EncodeSnafu)?;

        signer
            .authorize(&store.record_key(&record.id), &bytes)
            .await
            .map_err(|e| SubmitError::from_signer(WritePhase::Data, e))?;
        store
            .write_record(&record.id, bytes)
            .await
            .map_err(|e| SubmitError::at_phase(WritePhase::Data, e))?;
        tracing::debug!(id = %record.id, "record written");

        // The index value is only known after the fresh read, so the signer
        // authorises the id being appended.
        signer
            .authorize(&store.keys().index_key, record.id.as_str().as_bytes())
            .await
            .map_err(|e| SubmitError::from_signer(WritePhase::Index, e))?;
        store
            .append_to_index(&record.id)
            .await
            .map_err(|e| SubmitError::at_phase(WritePhase::Index, e))?;

        Ok(record)
    }

    fn schedule_reset(&self, generation: u64, after: Duration) {
        if after.is_zero() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            shared.reset(generation);
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use async_trait::async_trait;
    use heliowatch_kv::{KeyIndexStore, KeyValueLedger, LedgerError, MemoryLedger, WriteReceipt};
    use heliowatch_types::{RecordCodec, RecordIndex, Severity};

    use super::*;
    use crate::signer::StaticSigner;

    const IDENTITY: &str = "0x1111222233334444555566667777888899990000";

    fn pipeline_over(ledger: &MemoryLedger) -> (SubmissionPipeline, Arc<StaticSigner>) {
        let signer = Arc::new(StaticSigner::new(IDENTITY));
        let engine = SyncEngine::new(KeyIndexStore::new(Arc::new(ledger.clone())));
        (SubmissionPipeline::new(engine, signer.clone()), signer)
    }

    fn draft() -> ReportDraft {
        ReportDraft::new(4, "Power Grid", "Texas").with_details("transformer trips")
    }

    fn drain(rx: &mut broadcast::Receiver<SubmissionEvent>) -> Vec<SubmissionState> {
        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            states.push(event.state);
        }
        states
    }

    #[tokio::test]
    async fn test_submit_writes_record_then_index() {
        let ledger = MemoryLedger::new();
        let (pipeline, signer) = pipeline_over(&ledger);

        let receipt = pipeline.submit(draft()).await.unwrap();

        assert!(receipt.id.as_str().starts_with("sw-"));
        assert_eq!(receipt.record.severity, Severity::new(4).unwrap());
        assert_eq!(receipt.record.submitter_id, IDENTITY);
        assert!(receipt.record.encoded_payload.starts_with("FHE-"));
        assert_eq!(signer.authorized_count(), 2);

        let index = RecordIndex::from_bytes(&ledger.raw("spaceweather_keys").unwrap()).unwrap();
        assert_eq!(index.ids(), &[receipt.id.clone()]);
        assert!(ledger.raw(&format!("spaceweather_{}", receipt.id)).is_some());

        let snapshot = receipt.snapshot().unwrap();
        assert_eq!(snapshot.records(), &[receipt.record.clone()]);
        assert_eq!(pipeline.state(), SubmissionState::Success);
        assert_eq!(pipeline.last_event().id, Some(receipt.id));
    }

    #[tokio::test]
    async fn test_details_only_inside_payload() {
        let ledger = MemoryLedger::new();
        let (pipeline, _) = pipeline_over(&ledger);
        let receipt = pipeline.submit(draft()).await.unwrap();

        let raw = ledger.raw(&format!("spaceweather_{}", receipt.id)).unwrap();
        assert!(!String::from_utf8(raw).unwrap().contains("transformer trips"));
        let opened = RecordCodec::default().decode(&receipt.record.encoded_payload).unwrap();
        assert_eq!(opened, draft());
    }

    #[tokio::test]
    async fn test_invalid_draft_makes_no_ledger_calls() {
        let ledger = MemoryLedger::new();
        let (pipeline, signer) = pipeline_over(&ledger);
        let mut rx = pipeline.subscribe();

        let err = pipeline.submit(ReportDraft::new(3, "Navigation", "  ")).await.unwrap_err();

        assert!(matches!(err, SubmitError::Validation { .. }));
        assert_eq!(ledger.get_count(), 0);
        assert_eq!(ledger.set_count(), 0);
        assert_eq!(ledger.availability_checks(), 0);
        assert_eq!(signer.authorized_count(), 0);
        assert_eq!(drain(&mut rx), vec![SubmissionState::Pending, SubmissionState::Error]);
        assert!(pipeline.last_event().message.starts_with("Submission failed: Invalid report"));
    }

    #[tokio::test]
    async fn test_failed_record_write_never_touches_index() {
        let ledger = MemoryLedger::new();
        ledger.fail_next_sets(1);
        let (pipeline, _) = pipeline_over(&ledger);

        let err = pipeline.submit(draft()).await.unwrap_err();

        assert!(matches!(err, SubmitError::StoreWrite { phase: WritePhase::Data, .. }));
        assert_eq!(ledger.set_count(), 1);
        assert_eq!(ledger.set_count_for("spaceweather_keys"), 0);
        assert_eq!(ledger.get_count(), 0);
        assert_eq!(pipeline.state(), SubmissionState::Error);
    }

    #[tokio::test]
    async fn test_failed_index_write_orphans_record() {
        let ledger = MemoryLedger::new();
        ledger.fail_sets_for_key("spaceweather_keys");
        let (pipeline, _) = pipeline_over(&ledger);

        let err = pipeline.submit(draft()).await.unwrap_err();

        assert_eq!(err.phase(), Some(WritePhase::Index));
        assert_eq!(ledger.raw("spaceweather_keys"), None);
        assert_eq!(ledger.keys().len(), 1);
        assert!(ledger.keys()[0].starts_with("spaceweather_sw-"));
    }

    #[tokio::test]
    async fn test_index_is_read_fresh_before_append() {
        let ledger = MemoryLedger::new();
        ledger.put_raw("spaceweather_keys", r#"["sw-existing"]"#);
        let (pipeline, _) = pipeline_over(&ledger);

        let receipt = pipeline.submit(draft()).await.unwrap();

        let index = RecordIndex::from_bytes(&ledger.raw("spaceweather_keys").unwrap()).unwrap();
        assert_eq!(index, RecordIndex::from_ids([RecordId::from("sw-existing"), receipt.id]));
    }

    #[tokio::test]
    async fn test_malformed_index_is_not_overwritten() {
        let ledger = MemoryLedger::new();
        ledger.put_raw("spaceweather_keys", "corrupt");
        let (pipeline, _) = pipeline_over(&ledger);

        let err = pipeline.submit(draft()).await.unwrap_err();

        assert_eq!(err.phase(), Some(WritePhase::Index));
        assert_eq!(ledger.raw("spaceweather_keys").unwrap(), b"corrupt");
    }

    #[tokio::test]
    async fn test_signer_decline_is_user_rejection() {
        let ledger = MemoryLedger::new();
        let (pipeline, signer) = pipeline_over(&ledger);
        signer.decline_next(1);

        let err = pipeline.submit(draft()).await.unwrap_err();

        assert!(matches!(err, SubmitError::UserRejected { phase: WritePhase::Data, .. }));
        assert_eq!(ledger.set_count(), 0);
        assert_eq!(pipeline.last_event().message, "Transaction rejected by user");
    }

    #[tokio::test]
    async fn test_ledger_rejection_of_index_write() {
        let ledger = MemoryLedger::new();
        ledger.reject_sets_for_key("spaceweather_keys");
        let (pipeline, _) = pipeline_over(&ledger);

        let err = pipeline.submit(draft()).await.unwrap_err();

        assert!(matches!(err, SubmitError::UserRejected { phase: WritePhase::Index, .. }));
        assert_eq!(pipeline.last_event().message, "Transaction rejected by user");
    }

    #[tokio::test]
    async fn test_offline_ledger_fails_at_data_phase() {
        let ledger = MemoryLedger::new();
        ledger.set_available(false);
        let (pipeline, _) = pipeline_over(&ledger);

        let err = pipeline.submit(draft()).await.unwrap_err();
        match err {
            SubmitError::StoreWrite { phase, source } => {
                assert_eq!(phase, WritePhase::Data);
                assert!(source.is_retryable());
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Ledger whose availability probe always errors.
    struct ProbeFailing(MemoryLedger);

    #[async_trait]
    impl KeyValueLedger for ProbeFailing {
        async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
            self.0.get_data(key).await
        }

        async fn set_data(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt, LedgerError> {
            self.0.set_data(key, value).await
        }

        async fn is_available(&self) -> Result<bool, LedgerError> {
            Err(LedgerError::Unavailable { message: "probe broken".to_owned() })
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_submission_successful() {
        let ledger = MemoryLedger::new();
        let engine = SyncEngine::new(KeyIndexStore::new(Arc::new(ProbeFailing(ledger.clone()))));
        let pipeline = SubmissionPipeline::new(engine, Arc::new(StaticSigner::new(IDENTITY)));

        let receipt = pipeline.submit(draft()).await.unwrap();

        assert!(matches!(receipt.refresh, Err(SyncError::AvailabilityProbe { .. })));
        assert!(receipt.snapshot().is_none());
        assert_eq!(pipeline.state(), SubmissionState::Success);
        assert_eq!(ledger.set_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_to_idle() {
        let ledger = MemoryLedger::new();
        let (pipeline, _) = pipeline_over(&ledger);
        let mut rx = pipeline.subscribe();

        pipeline.submit(draft()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(pipeline.state(), SubmissionState::Success);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pipeline.state(), SubmissionState::Idle);

        assert_eq!(drain(&mut rx), vec![
            SubmissionState::Pending,
            SubmissionState::Success,
            SubmissionState::Idle,
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_resets_after_error_display() {
        let ledger = MemoryLedger::new();
        let (pipeline, _) = pipeline_over(&ledger);

        pipeline.submit(ReportDraft::new(9, "Other", "Lagos")).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(pipeline.state(), SubmissionState::Error);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pipeline.state(), SubmissionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_submission_cancels_pending_reset() {
        let ledger = MemoryLedger::new();
        let (pipeline, _) = pipeline_over(&ledger);

        // Error at t=0 schedules a reset at t=3s.
        pipeline.submit(ReportDraft::new(0, "Other", "Lagos")).await.unwrap_err();
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Success at t=2s schedules its own reset at t=4s.
        pipeline.submit(draft()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(pipeline.state(), SubmissionState::Success);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pipeline.state(), SubmissionState::Idle);
        assert_eq!(pipeline.last_event().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_display_disables_reset() {
        let ledger = MemoryLedger::new();
        let engine = SyncEngine::new(KeyIndexStore::new(Arc::new(ledger.clone())));
        let config = SubmissionConfig::builder()
            .success_display(Duration::ZERO)
            .build()
            .unwrap();
        let pipeline =
            SubmissionPipeline::with_config(engine, Arc::new(StaticSigner::new(IDENTITY)), config);

        pipeline.submit(draft()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(pipeline.state(), SubmissionState::Success);
    }
}
