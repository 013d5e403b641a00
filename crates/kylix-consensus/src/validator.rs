use std::collections::HashMap;
use std::path::PathBuf;

use kylix_core::{KylixError, ValidatorId};
use tracing::warn;

use crate::performance::{PerformanceSnapshot, PerformanceWindow};

/// The validator id `current_validator()` returns when the active set is
/// empty (spec.md §4.3).
pub const NO_VALIDATOR_SENTINEL: &str = "none";

/// Round-robin proof-of-authority validator set (spec.md §4.3). Runs as a
/// serial actor: one call completes before the next is admitted.
pub struct ValidatorCoordinator {
    validators: Vec<ValidatorId>,
    index: usize,
    public_keys: HashMap<ValidatorId, Vec<u8>>,
    metrics: HashMap<ValidatorId, PerformanceWindow>,
    config_dir: PathBuf,
    window_size: usize,
}

impl ValidatorCoordinator {
    pub fn new(config_dir: impl Into<PathBuf>, window_size: usize) -> Self {
        Self {
            validators: Vec::new(),
            index: 0,
            public_keys: HashMap::new(),
            metrics: HashMap::new(),
            config_dir: config_dir.into(),
            window_size,
        }
    }

    /// Seed the coordinator with an initial validator set, bypassing the
    /// vouching rule. Used at genesis / startup, where the first validator
    /// has no one to vouch for it.
    pub fn seed_validator(&mut self, id: ValidatorId, pk: Vec<u8>) {
        self.public_keys.insert(id.clone(), pk);
        self.metrics
            .insert(id.clone(), PerformanceWindow::new(self.window_size));
        self.validators.push(id);
    }

    /// Returns `validators[index]` and advances `index` modulo the set
    /// size. Returns the `"none"` sentinel and logs if the set is empty.
    pub fn current_validator(&mut self) -> ValidatorId {
        if self.validators.is_empty() {
            warn!("current_validator called with an empty validator set");
            return NO_VALIDATOR_SENTINEL.to_string();
        }
        let id = self.validators[self.index].clone();
        self.index = (self.index + 1) % self.validators.len();
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.validators.iter().any(|v| v == id)
    }

    pub fn public_key(&self, id: &str) -> Option<&[u8]> {
        self.public_keys.get(id).map(|v| v.as_slice())
    }

    pub fn add_validator(
        &mut self,
        id: ValidatorId,
        pk: Vec<u8>,
        vouched_by: &str,
    ) -> Result<(), KylixError> {
        if !self.contains(vouched_by) {
            return Err(KylixError::UnknownValidator(vouched_by.to_string()));
        }
        if self.contains(&id) {
            return Err(KylixError::ValidatorExists(id));
        }
        self.persist_public_key(&id, &pk);
        self.public_keys.insert(id.clone(), pk);
        self.metrics
            .insert(id.clone(), PerformanceWindow::new(self.window_size));
        self.validators.push(id);
        Ok(())
    }

    pub fn remove_validator(&mut self, id: &str) -> Result<(), KylixError> {
        if !self.contains(id) {
            return Err(KylixError::UnknownValidator(id.to_string()));
        }
        if self.validators.len() == 1 {
            return Err(KylixError::CannotRemoveLastValidator);
        }
        self.validators.retain(|v| v != id);
        self.public_keys.remove(id);
        self.metrics.remove(id);
        if self.index >= self.validators.len() {
            self.index = self.validators.len() - 1;
        }
        Ok(())
    }

    /// Prepends to the two sliding windows and updates `last_active`.
    /// A no-op (with a warning) for an id not in the active set.
    pub fn record_transaction_performance(
        &mut self,
        id: &str,
        success: bool,
        tx_time_micros: Option<u64>,
    ) {
        match self.metrics.get_mut(id) {
            Some(window) => window.record(success, tx_time_micros),
            None => warn!(validator = id, "recorded performance for unknown validator"),
        }
    }

    pub fn status(&self) -> Vec<ValidatorId> {
        self.validators.clone()
    }

    pub fn get_performance_metrics(&self, id: &str) -> Option<PerformanceSnapshot> {
        self.metrics.get(id).map(|w| w.snapshot())
    }

    /// Best-effort asynchronous write of the raw public key bytes to
    /// `<config_dir>/<id>.pub` (spec.md §4.3). Runs on a background
    /// thread; readers must tolerate a momentarily missing file.
    fn persist_public_key(&self, id: &str, pk: &[u8]) {
        let path = self.config_dir.join(format!("{id}.pub"));
        let dir = self.config_dir.clone();
        let bytes = pk.to_vec();
        std::thread::spawn(move || {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                warn!(error = %e, "failed to create validators directory");
                return;
            }
            if let Err(e) = std::fs::write(&path, bytes) {
                warn!(error = %e, path = %path.display(), "failed to persist validator public key");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator_with(ids: &[&str]) -> ValidatorCoordinator {
        let dir = std::env::temp_dir().join(format!("kylix-consensus-test-{}", std::process::id()));
        let mut c = ValidatorCoordinator::new(dir, 100);
        for id in ids {
            c.seed_validator(id.to_string(), vec![]);
        }
        c
    }

    #[test]
    fn current_validator_cycles_in_order() {
        let mut c = coordinator_with(&["v1", "v2", "v3"]);
        assert_eq!(c.current_validator(), "v1");
        assert_eq!(c.current_validator(), "v2");
        assert_eq!(c.current_validator(), "v3");
        assert_eq!(c.current_validator(), "v1");
    }

    #[test]
    fn current_validator_returns_sentinel_when_empty() {
        let mut c = coordinator_with(&[]);
        assert_eq!(c.current_validator(), NO_VALIDATOR_SENTINEL);
    }

    #[test]
    fn add_validator_requires_known_voucher() {
        let mut c = coordinator_with(&["v1"]);
        let err = c.add_validator("v2".into(), vec![], "ghost").unwrap_err();
        assert!(matches!(err, KylixError::UnknownValidator(_)));
    }

    #[test]
    fn add_validator_rejects_duplicate_id() {
        let mut c = coordinator_with(&["v1"]);
        let err = c.add_validator("v1".into(), vec![], "v1").unwrap_err();
        assert!(matches!(err, KylixError::ValidatorExists(_)));
    }

    #[test]
    fn remove_validator_refuses_to_empty_the_set() {
        let mut c = coordinator_with(&["v1"]);
        let err = c.remove_validator("v1").unwrap_err();
        assert!(matches!(err, KylixError::CannotRemoveLastValidator));
    }

    #[test]
    fn remove_validator_clamps_index() {
        let mut c = coordinator_with(&["v1", "v2"]);
        c.current_validator();
        c.current_validator();
        c.remove_validator("v2").unwrap();
        assert_eq!(c.current_validator(), "v1");
    }

    #[test]
    fn record_transaction_performance_is_noop_for_unknown_validator() {
        let mut c = coordinator_with(&["v1"]);
        c.record_transaction_performance("ghost", true, Some(10));
        assert!(c.get_performance_metrics("ghost").is_none());
    }
}
