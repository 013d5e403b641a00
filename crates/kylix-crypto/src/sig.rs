use std::collections::HashMap;
use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use kylix_core::KylixError;

/// `sign(msg, sk) -> bytes` (spec.md §4.1).
pub fn sign(message: &[u8], secret_key: &[u8; 32]) -> Vec<u8> {
    let signing_key = SigningKey::from_bytes(secret_key);
    signing_key.sign(message).to_bytes().to_vec()
}

/// `verify(msg, sig, pk) -> {ok | invalid_signature | verification_failed}`
/// (spec.md §4.1 / §4.4 step 8). A well-formed signature that does not
/// match the message is `invalid_signature`; a malformed public key,
/// malformed signature, or any other internal crypto error is
/// `verification_failed`.
pub fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), KylixError> {
    let pk_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| KylixError::VerificationFailed)?;
    let verifying_key =
        VerifyingKey::from_bytes(&pk_bytes).map_err(|_| KylixError::VerificationFailed)?;
    let sig = Signature::from_slice(signature).map_err(|_| KylixError::VerificationFailed)?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| KylixError::InvalidSignature)
}

/// `load_public_keys(dir) -> map(id -> pk_bytes)` (spec.md §4.1). Scans
/// `dir` for files ending in `.pub`; the file stem is the validator id.
/// Non-`.pub` files are ignored.
pub fn load_public_keys(dir: &Path) -> Result<HashMap<String, Vec<u8>>, KylixError> {
    let mut out = HashMap::new();
    let entries = std::fs::read_dir(dir).map_err(|e| KylixError::Io(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| KylixError::Io(e.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pub") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let bytes = std::fs::read(&path).map_err(|e| KylixError::Io(e.to_string()))?;
        out.insert(stem.to_string(), bytes);
    }
    Ok(out)
}
