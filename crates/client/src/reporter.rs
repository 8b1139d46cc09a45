//! Facade tying synchronisation, submission and projection together.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use heliowatch_kv::{KeyIndexStore, KeyValueLedger};
use heliowatch_types::{Record, RecordCodec, ReportDraft, config::HeliowatchConfig};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::{
    error::{SubmitError, SyncError},
    signer::Signer,
    submit::{SubmissionEvent, SubmissionPipeline, SubmissionReceipt},
    sync::{Snapshot, SyncEngine},
    view::{Stats, ViewProjector, ViewQuery},
};

/// Everything a list view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    /// Records matching the query, newest first.
    pub records: Vec<Record>,
    /// Counts over the whole snapshot.
    pub stats: Stats,
    /// Whether a refresh is in flight.
    pub refreshing: bool,
    /// Latest submission transition.
    pub submission: SubmissionEvent,
}

/// Holds the latest snapshot and routes refreshes and submissions.
#[derive(Debug)]
pub struct Reporter {
    engine: SyncEngine,
    pipeline: SubmissionPipeline,
    held: RwLock<Held>,
    passes: AtomicU64,
    refreshes_in_flight: AtomicUsize,
}

/// The adopted snapshot and the pass that produced it.
#[derive(Debug, Default)]
struct Held {
    pass: u64,
    snapshot: Arc<Snapshot>,
}

/// Counts one refresh in flight until dropped, including on cancellation.
struct RefreshGuard<'a>(&'a AtomicUsize);

impl<'a> RefreshGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Reporter {
    /// Creates a reporter over `engine` submitting as `signer`.
    pub fn new(engine: SyncEngine, signer: Arc<dyn Signer>) -> Self {
        let pipeline = SubmissionPipeline::new(engine.clone(), signer);
        Self::with_pipeline(engine, pipeline)
    }

    /// Creates a reporter from an existing pipeline.
    pub fn with_pipeline(engine: SyncEngine, pipeline: SubmissionPipeline) -> Self {
        Self {
            engine,
            pipeline,
            held: RwLock::new(Held::default()),
            passes: AtomicU64::new(0),
            refreshes_in_flight: AtomicUsize::new(0),
        }
    }

    /// Wires up store, engine and pipeline from a configuration.
    pub fn from_config(
        ledger: Arc<dyn KeyValueLedger>,
        signer: Arc<dyn Signer>,
        config: &HeliowatchConfig,
    ) -> Self {
        let store = KeyIndexStore::with_config(ledger, config.keys.clone(), config.store.clone());
        let engine = SyncEngine::with_config(store, RecordCodec::default(), config.sync.clone());
        let pipeline =
            SubmissionPipeline::with_config(engine.clone(), signer, config.submission.clone());
        Self::with_pipeline(engine, pipeline)
    }

    /// Returns the latest successfully synchronised snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.held.read().snapshot)
    }

    /// Returns true while at least one refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refreshes_in_flight.load(Ordering::SeqCst) > 0
    }

    /// Returns the submitting identity.
    pub fn identity(&self) -> String {
        self.pipeline.identity()
    }

    /// Subscribes to submission transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.pipeline.subscribe()
    }

    /// Synchronises and returns the pass's snapshot.
    ///
    /// The held snapshot is replaced only if no later pass has been adopted
    /// meanwhile.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] of a failed pass. The previous snapshot is kept.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, SyncError> {
        let _guard = RefreshGuard::enter(&self.refreshes_in_flight);
        let pass = self.begin_pass();

        let snapshot = Arc::new(self.engine.synchronize().await?);
        self.adopt(pass, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Submits `draft`, adopting the refreshed snapshot on success.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's [`SubmitError`].
    pub async fn submit(&self, draft: ReportDraft) -> Result<SubmissionReceipt, SubmitError> {
        let receipt = self.pipeline.submit(draft).await?;
        if let Some(snapshot) = receipt.snapshot() {
            let pass = self.begin_pass();
            self.adopt(pass, Arc::new(snapshot.clone()));
        }
        Ok(receipt)
    }

    fn begin_pass(&self) -> u64 {
        self.passes.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn adopt(&self, pass: u64, snapshot: Arc<Snapshot>) {
        let mut held = self.held.write();
        if pass > held.pass {
            *held = Held { pass, snapshot };
        } else {
            tracing::debug!(pass, adopted = held.pass, "discarding snapshot from an older pass");
        }
    }

    /// Projects the held snapshot through `query`.
    pub fn view(&self, query: &ViewQuery) -> RenderModel {
        let snapshot = self.snapshot();
        RenderModel {
            records: ViewProjector::filter(&snapshot, query).into_iter().cloned().collect(),
            stats: ViewProjector::aggregate(&snapshot),
            refreshing: self.is_refreshing(),
            submission: self.pipeline.last_event(),
        }
    }
}
