use chrono::{DateTime, Utc};

/// One pending submission in the FIFO (spec.md §4.5).
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub reference: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub validator: String,
    pub signature: Vec<u8>,
    pub submitted_at: DateTime<Utc>,
}
