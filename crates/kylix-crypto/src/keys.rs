use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

/// An Ed25519 keypair. `ed25519_dalek::SigningKey` already zeroizes its
/// secret bytes on drop; we keep the pair together so callers (tests, the
/// node's demo subcommands) have one handle for both halves.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh keypair. Used by test helpers and by the node's
    /// demo subcommands to mint a throwaway signer.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Restore a keypair from 32 raw secret-key bytes (e.g. loaded from a
    /// wallet file in a demo harness).
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Raw public key bytes, the form `load_public_keys` expects to find
    /// in a `.pub` file.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key().to_bytes()
    }

    /// Raw secret-key bytes, for a caller that needs to persist its own
    /// identity across process restarts (e.g. a node's local signing key).
    /// Wrapped in `Zeroizing` so the in-memory copy is wiped once the
    /// caller's buffer goes out of scope.
    pub fn secret_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {} }}", hex::encode(self.public_key_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_and_verifies_via_dalek_directly() {
        use ed25519_dalek::Verifier;
        let kp = KeyPair::generate();
        let sig_bytes = kp.sign(b"hello");
        let sig = ed25519_dalek::Signature::from_slice(&sig_bytes).unwrap();
        assert!(kp.verifying_key().verify(b"hello", &sig).is_ok());
    }

    #[test]
    fn from_bytes_round_trips_public_key() {
        let kp = KeyPair::generate();
        let secret = kp.signing_key.to_bytes();
        let restored = KeyPair::from_bytes(&secret);
        assert_eq!(kp.public_key_bytes(), restored.public_key_bytes());
    }
}
