use chrono::{DateTime, Utc};

/// `status()` snapshot (spec.md §4.5 "Stats").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueueStats {
    pub submitted: u64,
    pub processed: u64,
    pub failed: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub pending_count: usize,
    pub completed_count: usize,
}

/// `batch_size` / `processing_interval_ms` (spec.md §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub processing_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            processing_interval_ms: 100,
        }
    }
}
