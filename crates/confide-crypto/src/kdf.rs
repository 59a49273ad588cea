//! Key derivation: master secret + principal id + context → per-message key.
//!
//! Two stages. First, `master_secret ‖ principal_id ‖ context` is hashed
//! with SHA-256 so the derivation input has a fixed length regardless of
//! how long the principal id is. Then PBKDF2-HMAC-SHA256 (100,000
//! iterations) stretches that input with the given salt into a 256-bit key.
//!
//! v1 envelopes used [`LEGACY_SALT`] — one global value for every message
//! and every user, so two messages from the same principal derived the same
//! key. That is the weakness the v2 per-message random salt (and the
//! migration tool) exists to fix.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// PBKDF2 iteration count. Fixed by the wire format; changing it breaks
/// decryption of every existing envelope.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// The single global salt used by v1 envelopes.
pub const LEGACY_SALT: &[u8; 16] = b"confide-v1-salt0";

/// KDF context string for server-side message content keys.
pub const CONTEXT_MESSAGE: &str = "message-content";

/// KDF context string for the client-side master-key wrapping key.
pub const CONTEXT_MASTER_KEY_WRAP: &str = "master-key-wrap";

/// A derived 256-bit key. Exists only for the duration of one
/// encrypt/decrypt call (server side) or a client session (client side).
///
/// Zeroized on drop to prevent key material lingering in memory.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 256-bit key from a master secret, principal id, and context.
///
/// The salt is either [`LEGACY_SALT`] (v1) or a random 16-byte per-message
/// value (v2); the caller picks per the envelope version being handled.
pub fn derive_key(
    master_secret: &[u8],
    principal_id: &str,
    context: &str,
    salt: &[u8],
    iterations: u32,
) -> DerivedKey {
    let mut hasher = Sha256::new();
    hasher.update(master_secret);
    hasher.update(principal_id.as_bytes());
    hasher.update(context.as_bytes());
    let mut ikm: [u8; 32] = hasher.finalize().into();

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(&ikm, salt, iterations, &mut key);
    ikm.zeroize();

    DerivedKey::from_bytes(key)
}
