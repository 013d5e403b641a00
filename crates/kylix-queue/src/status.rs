use chrono::{DateTime, Utc};
use kylix_core::TransactionId;

/// The outcome recorded once a dispatched admission call completes. Holds
/// the error's stable `code()` rather than the `KylixError` itself, since
/// statuses are meant to be cheap to snapshot and hand back to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionOutcome {
    Ok(TransactionId),
    Err(&'static str),
}

/// `get_transaction_status(ref) -> none | pending | completed` (spec.md §4.5).
#[derive(Clone, Debug)]
pub enum TransactionStatus {
    Pending {
        submitted_at: DateTime<Utc>,
    },
    Completed {
        result: TransactionOutcome,
        completed_at: DateTime<Utc>,
    },
}
