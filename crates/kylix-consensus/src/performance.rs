use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Sliding window of the last `window_size` transaction outcomes for one
/// validator (spec.md §3 "Performance sample").
#[derive(Clone, Debug)]
pub struct PerformanceWindow {
    window_size: usize,
    recent_results: VecDeque<bool>,
    recent_tx_times: VecDeque<u64>,
    last_active: Option<DateTime<Utc>>,
}

/// Read-only snapshot returned by `status()`/`get_performance_metrics()`.
#[derive(Clone, Debug, PartialEq)]
pub struct PerformanceSnapshot {
    pub total_transactions: usize,
    pub successful_transactions: usize,
    pub failure_rate: f64,
    pub avg_tx_time: f64,
    pub last_active: Option<DateTime<Utc>>,
}

impl PerformanceWindow {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            recent_results: VecDeque::with_capacity(window_size),
            recent_tx_times: VecDeque::with_capacity(window_size),
            last_active: None,
        }
    }

    /// Prepend a result and trim both windows to `window_size`.
    pub fn record(&mut self, success: bool, tx_time_micros: Option<u64>) {
        self.recent_results.push_front(success);
        while self.recent_results.len() > self.window_size {
            self.recent_results.pop_back();
        }
        if let Some(t) = tx_time_micros {
            self.recent_tx_times.push_front(t);
            while self.recent_tx_times.len() > self.window_size {
                self.recent_tx_times.pop_back();
            }
        }
        self.last_active = Some(Utc::now());
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let total = self.recent_results.len();
        let successful = self.recent_results.iter().filter(|r| **r).count();
        let failed = total - successful;
        let failure_rate = if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64
        };
        let avg_tx_time = if self.recent_tx_times.is_empty() {
            0.0
        } else {
            self.recent_tx_times.iter().sum::<u64>() as f64 / self.recent_tx_times.len() as f64
        };
        PerformanceSnapshot {
            total_transactions: total,
            successful_transactions: successful,
            failure_rate,
            avg_tx_time,
            last_active: self.last_active,
        }
    }
}
