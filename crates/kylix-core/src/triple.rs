use serde::{Deserialize, Serialize};

use crate::error::KylixError;

/// Maximum size, in bytes, of a single subject/predicate/object field.
pub const MAX_FIELD_BYTES: usize = 64 * 1024;

/// Maximum size, in bytes, of the combined canonical record.
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// A PROV-O statement: `(subject, predicate, object)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Shape and size checks from spec.md §3 and §4.4 steps 1–2.
    pub fn validate(&self) -> Result<(), KylixError> {
        if self.subject.is_empty() {
            return Err(KylixError::InvalidSubject);
        }
        if self.predicate.is_empty() {
            return Err(KylixError::InvalidPredicate);
        }
        if self.object.is_empty() {
            return Err(KylixError::InvalidObject);
        }
        if self.subject.len() > MAX_FIELD_BYTES
            || self.predicate.len() > MAX_FIELD_BYTES
            || self.object.len() > MAX_FIELD_BYTES
        {
            return Err(KylixError::DataTooLarge);
        }
        if self.subject.len() + self.predicate.len() + self.object.len() > MAX_RECORD_BYTES {
            return Err(KylixError::DataTooLarge);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_fields() {
        assert!(matches!(
            Triple::new("", "p", "o").validate(),
            Err(KylixError::InvalidSubject)
        ));
        assert!(matches!(
            Triple::new("s", "", "o").validate(),
            Err(KylixError::InvalidPredicate)
        ));
        assert!(matches!(
            Triple::new("s", "p", "").validate(),
            Err(KylixError::InvalidObject)
        ));
    }

    #[test]
    fn accepts_field_at_exactly_the_limit() {
        let s = "a".repeat(MAX_FIELD_BYTES);
        assert!(Triple::new(s, "p", "o").validate().is_ok());
    }

    #[test]
    fn rejects_field_one_byte_over_the_limit() {
        let s = "a".repeat(MAX_FIELD_BYTES + 1);
        assert!(matches!(
            Triple::new(s, "p", "o").validate(),
            Err(KylixError::DataTooLarge)
        ));
    }
}
