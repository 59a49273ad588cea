//! confide-client: the end-to-end layer a client device runs on top of the
//! server-side message cipher.
//!
//! Key hierarchy:
//! ```text
//! user handle (stable, client-known)
//!   → wrapping key (SHA-256 pre-hash + PBKDF2-SHA256/100k, random salt)
//!     → wraps the Master Key (256-bit random, one per user)
//!       → AES-256-GCM over each human-authored message (fresh IV, no salt)
//! ```
//! The wrapped record `{encrypted_key, salt, iv}` is stored server-side for
//! cross-device continuity but is opaque there: the unwrapping key depends
//! on the handle, which the server never combines with this derivation.
//!
//! Server-side encryption is mandatory and independent of this layer; the
//! E2E wrap is an additional, optional layer for human-authored content in
//! conversations that are not AI-exclusive.

pub mod error;
pub mod master_key;
pub mod message;
pub mod transport;

pub use error::ClientError;
pub use master_key::{MasterKey, MasterKeyManager};
pub use message::{seal_outgoing, open_stored, Author, StoredMessage};
pub use transport::{InMemoryTransport, KeyRecordTransport, TransportError, WrappedKeyRecord};
