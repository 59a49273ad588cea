//! Wrapped-key-record exchange with the server.
//!
//! The server offers a get/put pair keyed to the authenticated user; both
//! blob fields are opaque to it. Network specifics (HTTP client, auth
//! headers, timeouts) live behind [`KeyRecordTransport`] so the key
//! lifecycle in [`crate::MasterKeyManager`] stays testable offline.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The server-persisted wrapped master key record. All fields base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyRecord {
    /// AES-256-GCM ciphertext of the raw master key, tag appended
    pub encrypted_key: String,
    /// 16-byte PBKDF2 salt for the wrapping key
    pub salt: String,
    /// 12-byte GCM nonce
    pub iv: String,
}

/// Transport-level failure (anything that is not a clean "found" /
/// "not found" / "stored").
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("key record request failed: {0}")]
    Request(String),
}

/// Fetch/store of the current user's wrapped key record.
#[async_trait]
pub trait KeyRecordTransport: Send + Sync {
    /// `Ok(None)` means the user has no record yet (first use).
    async fn fetch(&self) -> Result<Option<WrappedKeyRecord>, TransportError>;

    /// Persist the record, keyed to the authenticated user.
    async fn store(&self, record: &WrappedKeyRecord) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: KeyRecordTransport + ?Sized> KeyRecordTransport for std::sync::Arc<T> {
    async fn fetch(&self) -> Result<Option<WrappedKeyRecord>, TransportError> {
        (**self).fetch().await
    }

    async fn store(&self, record: &WrappedKeyRecord) -> Result<(), TransportError> {
        (**self).store(record).await
    }
}

/// In-memory transport double for tests and local development.
#[derive(Default)]
pub struct InMemoryTransport {
    record: Mutex<Option<WrappedKeyRecord>>,
    fail_requests: Mutex<bool>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored record, as if another device had already initialized.
    pub fn with_record(record: WrappedKeyRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            fail_requests: Mutex::new(false),
        }
    }

    /// Make subsequent requests fail, simulating a server outage.
    pub fn set_failing(&self, failing: bool) {
        *self.fail_requests.lock() = failing;
    }

    pub fn stored_record(&self) -> Option<WrappedKeyRecord> {
        self.record.lock().clone()
    }
}

#[async_trait]
impl KeyRecordTransport for InMemoryTransport {
    async fn fetch(&self) -> Result<Option<WrappedKeyRecord>, TransportError> {
        if *self.fail_requests.lock() {
            return Err(TransportError::Request("simulated outage".into()));
        }
        Ok(self.record.lock().clone())
    }

    async fn store(&self, record: &WrappedKeyRecord) -> Result<(), TransportError> {
        if *self.fail_requests.lock() {
            return Err(TransportError::Request("simulated outage".into()));
        }
        *self.record.lock() = Some(record.clone());
        Ok(())
    }
}
