//! confide-crypto: versioned symmetric encryption for chat message content.
//!
//! Wire format (stored in each message's `content` column):
//! ```text
//! v1 (legacy):  "ENC1:" + base64(iv(12) || tag(16) || ciphertext)
//! v2 (current): "ENC2:" + base64(salt(16) || iv(12) || tag(16) || ciphertext)
//! ```
//!
//! Key derivation:
//! ```text
//! SHA-256(master_secret || principal_id || context)  — fixed-length input
//!   → PBKDF2-HMAC-SHA256, 100,000 iterations, salt   — 256-bit message key
//! ```
//! v1 used a single global salt for every message; v2 embeds a random
//! 16-byte salt per message. The migration tool in `confide-migrate`
//! rewrites v1 rows to v2.

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod secret;

pub use cipher::{MessageCipher, RowToDecrypt};
pub use envelope::{Envelope, Format, Version};
pub use error::CryptoError;
pub use kdf::{derive_key, DerivedKey};
pub use secret::MasterSecret;

/// Size of a derived message key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the per-message KDF salt embedded in v2 envelopes
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce
pub const IV_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;
