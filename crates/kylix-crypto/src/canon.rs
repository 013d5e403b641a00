use chrono::{DateTime, Utc};

/// Build the canonical string a transaction's hash and signature are
/// computed over: `subject|predicate|object|validator|iso8601(timestamp)`
/// (spec.md §3). Callers are responsible for formatting `timestamp` as
/// ISO 8601 before calling this — the crypto layer does not know about
/// timezone or precision conventions.
pub fn canonical_message(subject: &str, predicate: &str, object: &str, validator: &str, timestamp: &str) -> String {
    format!("{subject}|{predicate}|{object}|{validator}|{timestamp}")
}

/// Render a timestamp as whole-second ISO 8601, e.g. `2024-01-01T00:00:00Z`
/// (spec.md §3's own example carries no fractional seconds). Truncating to
/// second granularity is what lets a synchronous signer and the admission
/// pipeline's independently-minted timestamp (spec.md §4.4 step 5) land on
/// the same canonical string in the common case, instead of differing on
/// sub-second noise neither side controls.
pub fn iso8601(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
