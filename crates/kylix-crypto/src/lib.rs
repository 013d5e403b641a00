pub mod canon;
pub mod hash;
pub mod keys;
pub mod sig;

pub use canon::canonical_message;
pub use hash::sha256;
pub use keys::KeyPair;
pub use sig::{load_public_keys, sign, verify};
