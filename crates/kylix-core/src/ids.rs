use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A transaction's persistent identifier: the string `tx{N}` where `N` is
/// the monotonically increasing counter assigned at append time (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ParseTransactionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("tx").ok_or(ParseTransactionIdError)?;
        let n: u64 = digits.parse().map_err(|_| ParseTransactionIdError)?;
        Ok(Self(n))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseTransactionIdError;

impl fmt::Display for ParseTransactionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a `tx{{N}}` identifier")
    }
}

impl std::error::Error for ParseTransactionIdError {}

/// A validator identifier. Free-form (matches the `.pub` file-stem
/// convention used to load public keys — spec.md §4.1).
pub type ValidatorId = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = TransactionId::new(42);
        assert_eq!(id.to_string(), "tx42");
        assert_eq!("tx42".parse::<TransactionId>().unwrap(), id);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("tx".parse::<TransactionId>().is_err());
        assert!("abc".parse::<TransactionId>().is_err());
        assert!("tx-1".parse::<TransactionId>().is_err());
    }
}
