use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use kylix_chain::BlockchainServer;
use kylix_consensus::ValidatorCoordinatorHandle;
use kylix_dag::DagStore;
use tracing::info;

use crate::entry::QueueEntry;
use crate::stats::{QueueConfig, QueueStats};
use crate::status::{TransactionOutcome, TransactionStatus};

struct QueueInner {
    fifo: VecDeque<QueueEntry>,
    statuses: HashMap<String, TransactionStatus>,
    submitted: u64,
    processed: u64,
    failed: u64,
    last_processed_at: Option<chrono::DateTime<Utc>>,
}

/// The single-producer-multiple-submitter, single-processor transaction
/// queue (spec.md §4.5). A background ticker drains batches and, in
/// async mode, overrides the submitter-supplied `validator_id` with C3's
/// round-robin assignment before dispatching concurrently.
pub struct TransactionQueue<S: DagStore + Send + Sync + 'static> {
    inner: Mutex<QueueInner>,
    config: Mutex<QueueConfig>,
    server: Arc<BlockchainServer<S>>,
    validators: ValidatorCoordinatorHandle,
    ref_counter: AtomicU64,
}

impl<S: DagStore + Send + Sync + 'static> TransactionQueue<S> {
    pub fn new(server: Arc<BlockchainServer<S>>, validators: ValidatorCoordinatorHandle) -> Arc<Self> {
        Self::with_config(server, validators, QueueConfig::default())
    }

    pub fn with_config(
        server: Arc<BlockchainServer<S>>,
        validators: ValidatorCoordinatorHandle,
        config: QueueConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(QueueInner {
                fifo: VecDeque::new(),
                statuses: HashMap::new(),
                submitted: 0,
                processed: 0,
                failed: 0,
                last_processed_at: None,
            }),
            config: Mutex::new(config),
            server,
            validators,
            ref_counter: AtomicU64::new(0),
        })
    }

    /// `submit(s,p,o,v,sig) -> ok(ref)` (spec.md §4.5).
    pub fn submit(
        &self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        validator: impl Into<String>,
        signature: Vec<u8>,
    ) -> String {
        let reference = format!("ref{}", self.ref_counter.fetch_add(1, Ordering::SeqCst));
        let submitted_at = Utc::now();
        let entry = QueueEntry {
            reference: reference.clone(),
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            validator: validator.into(),
            signature,
            submitted_at,
        };
        let mut inner = self.inner.lock().expect("queue actor poisoned");
        inner
            .statuses
            .insert(reference.clone(), TransactionStatus::Pending { submitted_at });
        inner.fifo.push_back(entry);
        inner.submitted += 1;
        reference
    }

    pub fn get_transaction_status(&self, reference: &str) -> Option<TransactionStatus> {
        self.inner
            .lock()
            .expect("queue actor poisoned")
            .statuses
            .get(reference)
            .cloned()
    }

    pub fn set_processing_rate(&self, batch_size: usize, processing_interval_ms: u64) {
        let mut config = self.config.lock().expect("queue config poisoned");
        config.batch_size = batch_size;
        config.processing_interval_ms = processing_interval_ms;
    }

    /// Test hook: drops the FIFO and status map.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("queue actor poisoned");
        inner.fifo.clear();
        inner.statuses.clear();
        inner.submitted = 0;
        inner.processed = 0;
        inner.failed = 0;
        inner.last_processed_at = None;
    }

    pub fn status(&self) -> QueueStats {
        let inner = self.inner.lock().expect("queue actor poisoned");
        let pending_count = inner
            .statuses
            .values()
            .filter(|s| matches!(s, TransactionStatus::Pending { .. }))
            .count();
        let completed_count = inner
            .statuses
            .values()
            .filter(|s| matches!(s, TransactionStatus::Completed { .. }))
            .count();
        QueueStats {
            submitted: inner.submitted,
            processed: inner.processed,
            failed: inner.failed,
            last_processed_at: inner.last_processed_at,
            pending_count,
            completed_count,
        }
    }

    fn drain_batch(&self) -> Vec<QueueEntry> {
        let batch_size = self.config.lock().expect("queue config poisoned").batch_size;
        let mut inner = self.inner.lock().expect("queue actor poisoned");
        let n = batch_size.min(inner.fifo.len());
        inner.fifo.drain(..n).collect()
    }

    /// Drains up to `batch_size` entries and dispatches each concurrently,
    /// overriding the submitter-supplied validator with C3's round-robin
    /// assignment (spec.md §4.5 "Scheduling").
    pub async fn process_tick(&self) {
        let batch = self.drain_batch();
        if batch.is_empty() {
            return;
        }
        let tasks = batch.into_iter().map(|entry| {
            let server = Arc::clone(&self.server);
            let validator = self.validators.current_validator();
            async move {
                let outcome = server.add_transaction(
                    &entry.subject,
                    &entry.predicate,
                    &entry.object,
                    &validator,
                    &entry.signature,
                );
                (entry.reference, outcome)
            }
        });
        let results = futures::future::join_all(tasks).await;

        let mut inner = self.inner.lock().expect("queue actor poisoned");
        let completed_at = Utc::now();
        for (reference, outcome) in results {
            let recorded = match outcome {
                Ok(id) => {
                    inner.processed += 1;
                    TransactionOutcome::Ok(id)
                }
                Err(e) => {
                    inner.failed += 1;
                    TransactionOutcome::Err(e.code())
                }
            };
            inner.statuses.insert(
                reference,
                TransactionStatus::Completed {
                    result: recorded,
                    completed_at,
                },
            );
        }
        inner.last_processed_at = Some(completed_at);
    }

    /// Spawns the background ticker (spec.md §4.5 "Scheduling"). Fires
    /// every `processing_interval_ms`, re-reading the interval each tick
    /// so `set_processing_rate` takes effect without a restart.
    pub fn spawn_ticker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            info!("transaction queue ticker started");
            loop {
                let interval_ms = queue
                    .config
                    .lock()
                    .expect("queue config poisoned")
                    .processing_interval_ms;
                tokio::time::sleep(std::time::Duration::from_millis(interval_ms)).await;
                queue.process_tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kylix_consensus::ValidatorCoordinator;
    use kylix_crypto::canon::{canonical_message, iso8601};
    use kylix_crypto::hash;
    use kylix_crypto::keys::KeyPair;
    use kylix_dag::MemoryDagStore;

    fn setup() -> (Arc<TransactionQueue<MemoryDagStore>>, KeyPair) {
        let dir = std::env::temp_dir().join(format!("kylix-queue-test-{}", std::process::id()));
        let mut coordinator = ValidatorCoordinator::new(dir, 100);
        let kp = KeyPair::generate();
        coordinator.seed_validator("v1".to_string(), kp.public_key_bytes().to_vec());
        let handle = ValidatorCoordinatorHandle::new(coordinator);
        let server = Arc::new(BlockchainServer::new(MemoryDagStore::new(), handle.clone()));
        (TransactionQueue::new(server, handle), kp)
    }

    #[test]
    fn submit_records_a_pending_status() {
        let (queue, _kp) = setup();
        let r = queue.submit("s", "p", "o", "v1", vec![]);
        assert!(matches!(
            queue.get_transaction_status(&r),
            Some(TransactionStatus::Pending { .. })
        ));
    }

    #[test]
    fn unknown_reference_has_no_status() {
        let (queue, _kp) = setup();
        assert!(queue.get_transaction_status("ref999").is_none());
    }

    /// `process_tick` mints its own timestamp inside the admission pipeline
    /// (spec.md §4.4 step 5), independently of whatever timestamp the
    /// submitter signed against. Signing against `iso8601`'s whole-second
    /// rendering of "now" and dispatching immediately after lands in the
    /// same second in practice, so this is expected to complete `Ok`.
    #[tokio::test]
    async fn process_tick_dispatches_and_records_completion() {
        let (queue, kp) = setup();
        let guessed_ts = Utc::now();
        let canonical = canonical_message("s", "p", "o", "v1", &iso8601(guessed_ts));
        let digest = hash::sha256(canonical.as_bytes());
        let sig = kp.sign(&digest);

        let r = queue.submit("s", "p", "o", "v1", sig);
        queue.process_tick().await;

        match queue.get_transaction_status(&r) {
            Some(TransactionStatus::Completed { result, .. }) => {
                assert!(matches!(result, TransactionOutcome::Ok(_)));
            }
            other => panic!("expected a completed status, got {other:?}"),
        }
        let stats = queue.status();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.completed_count, 1);
    }

    #[tokio::test]
    async fn clear_drops_fifo_and_statuses() {
        let (queue, _kp) = setup();
        queue.submit("s", "p", "o", "v1", vec![]);
        queue.clear();
        assert_eq!(queue.status().submitted, 0);
        assert_eq!(queue.status().pending_count, 0);
    }
}
