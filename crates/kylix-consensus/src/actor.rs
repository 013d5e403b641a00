use std::sync::{Arc, Mutex};

use kylix_core::{KylixError, ValidatorId};

use crate::performance::PerformanceSnapshot;
use crate::validator::ValidatorCoordinator;

/// A cheaply-cloneable handle onto a [`ValidatorCoordinator`] guarded by a
/// mutex, giving it the serial-actor discipline spec.md §5 requires: one
/// call completes before the next is admitted, and every caller sees the
/// same state.
#[derive(Clone)]
pub struct ValidatorCoordinatorHandle(Arc<Mutex<ValidatorCoordinator>>);

impl ValidatorCoordinatorHandle {
    pub fn new(coordinator: ValidatorCoordinator) -> Self {
        Self(Arc::new(Mutex::new(coordinator)))
    }

    pub fn current_validator(&self) -> ValidatorId {
        self.0.lock().expect("validator actor poisoned").current_validator()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.lock().expect("validator actor poisoned").contains(id)
    }

    pub fn public_key(&self, id: &str) -> Option<Vec<u8>> {
        self.0
            .lock()
            .expect("validator actor poisoned")
            .public_key(id)
            .map(|b| b.to_vec())
    }

    /// Seed the initial validator set at startup, bypassing vouching.
    pub fn seed_validator(&self, id: ValidatorId, pk: Vec<u8>) {
        self.0.lock().expect("validator actor poisoned").seed_validator(id, pk);
    }

    pub fn add_validator(
        &self,
        id: ValidatorId,
        pk: Vec<u8>,
        vouched_by: &str,
    ) -> Result<(), KylixError> {
        self.0
            .lock()
            .expect("validator actor poisoned")
            .add_validator(id, pk, vouched_by)
    }

    pub fn remove_validator(&self, id: &str) -> Result<(), KylixError> {
        self.0
            .lock()
            .expect("validator actor poisoned")
            .remove_validator(id)
    }

    /// "Cast" semantics (spec.md §5): callers do not wait on a reply
    /// beyond the mutex acquisition.
    pub fn record_transaction_performance(&self, id: &str, success: bool, tx_time_micros: Option<u64>) {
        self.0
            .lock()
            .expect("validator actor poisoned")
            .record_transaction_performance(id, success, tx_time_micros);
    }

    pub fn status(&self) -> Vec<ValidatorId> {
        self.0.lock().expect("validator actor poisoned").status()
    }

    pub fn get_performance_metrics(&self, id: &str) -> Option<PerformanceSnapshot> {
        self.0
            .lock()
            .expect("validator actor poisoned")
            .get_performance_metrics(id)
    }
}
