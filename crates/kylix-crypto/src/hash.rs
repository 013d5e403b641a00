use sha2::{Digest, Sha256};

/// The collision-resistant hash `H` spec.md §1 assumes, instantiated as
/// SHA-256. Used both for the cached transaction `hash` field and for
/// chain linkage between successive DAG nodes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Hex-encoded form of [`sha256`], used wherever the hash is stored or
/// compared as a string (node records, dedup keys).
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
