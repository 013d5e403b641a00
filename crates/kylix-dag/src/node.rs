use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A committed transaction node (spec.md §3). Self-describing binary
/// serialization round-trips byte-for-byte on write/read; no schema
/// evolution is defined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionNode {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub validator: String,
    pub timestamp: DateTime<Utc>,
    pub signature: Vec<u8>,
    pub hash: String,
}

impl TransactionNode {
    /// True if `pattern` matches this node by string equality on every
    /// non-wildcard position (spec.md §4.2 "Matching semantics").
    pub fn matches(&self, subject: Option<&str>, predicate: Option<&str>, object: Option<&str>) -> bool {
        subject.map_or(true, |s| s == self.subject)
            && predicate.map_or(true, |p| p == self.predicate)
            && object.map_or(true, |o| o == self.object)
    }
}
