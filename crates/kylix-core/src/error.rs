use thiserror::Error;

/// Every wire-visible failure mode a Kylix operation can report, plus the
/// internal storage/serialization variants callers never need to match on.
#[derive(Debug, Error)]
pub enum KylixError {
    // ── Validator / PoA errors ───────────────────────────────────────────────
    #[error("unknown validator: {0}")]
    UnknownValidator(String),

    #[error("validator already exists: {0}")]
    ValidatorExists(String),

    #[error("cannot remove the last remaining validator")]
    CannotRemoveLastValidator,

    // ── Triple shape errors ──────────────────────────────────────────────────
    #[error("subject must be a non-empty string")]
    InvalidSubject,

    #[error("predicate must be a non-empty string")]
    InvalidPredicate,

    #[error("object must be a non-empty string")]
    InvalidObject,

    #[error("field or record exceeds the configured size limit")]
    DataTooLarge,

    // ── PROV-O shape errors ──────────────────────────────────────────────────
    #[error("subject/object kinds do not satisfy the role constraint for this predicate")]
    InvalidProvenanceRelationship,

    // ── Admission errors ─────────────────────────────────────────────────────
    #[error("a transaction with this canonical hash already exists")]
    DuplicateTransaction,

    #[error("signature does not match the canonical message")]
    InvalidSignature,

    #[error("signature verification raised an internal error")]
    VerificationFailed,

    // ── Storage errors ───────────────────────────────────────────────────────
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("node record is not a structured record")]
    InvalidData,

    #[error("not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("i/o error: {0}")]
    Io(String),

    // ── SPARQL errors ────────────────────────────────────────────────────────
    #[error("query parse error: {0}")]
    ParseError(String),

    // ── General ───────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// The code names spec.md §6 defines as the wire-visible vocabulary.
/// Useful for callers (e.g. a JSON-RPC shim) that need a stable string
/// rather than `Display`'s human-readable message.
impl KylixError {
    pub fn code(&self) -> &'static str {
        match self {
            KylixError::UnknownValidator(_) => "unknown_validator",
            KylixError::ValidatorExists(_) => "validator_exists",
            KylixError::CannotRemoveLastValidator => "cannot_remove_last_validator",
            KylixError::InvalidSubject => "invalid_subject",
            KylixError::InvalidPredicate => "invalid_predicate",
            KylixError::InvalidObject => "invalid_object",
            KylixError::DataTooLarge => "data_too_large",
            KylixError::InvalidProvenanceRelationship => "invalid_provenance_relationship",
            KylixError::DuplicateTransaction => "duplicate_transaction",
            KylixError::InvalidSignature => "invalid_signature",
            KylixError::VerificationFailed => "verification_failed",
            KylixError::NodeNotFound(_) => "node_not_found",
            KylixError::InvalidData => "invalid_data",
            KylixError::NotFound => "not_found",
            KylixError::Storage(_) => "storage_error",
            KylixError::Serialization(_) => "serialization_error",
            KylixError::Io(_) => "io_error",
            KylixError::ParseError(_) => "parse_error",
            KylixError::Other(_) => "error",
        }
    }
}
