use kylix_core::TransactionId;
use serde::{Deserialize, Serialize};

/// A directed edge between two transaction nodes (spec.md §3). The
/// admission pipeline produces exactly one `"confirms"` edge per append,
/// from the previously-appended node to the new one, forming the chain
/// spine; other labels are permitted and not deduplicated at store level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: TransactionId,
    pub to: TransactionId,
    pub label: String,
}

impl Edge {
    pub fn new(from: TransactionId, to: TransactionId, label: impl Into<String>) -> Self {
        Self {
            from,
            to,
            label: label.into(),
        }
    }

    pub fn confirms(from: TransactionId, to: TransactionId) -> Self {
        Self::new(from, to, "confirms")
    }

    /// The on-disk file stem for this edge (spec.md §4.2 persistence layout).
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }
}
