//! Client master key lifecycle: generate, wrap, exchange, cache, clear.
//!
//! Lifecycle: `Uninitialized → Fetching → {Unwrapped | Generating →
//! Wrapped&Stored → Unwrapped} → Cleared`. The unwrapped key lives only in
//! volatile memory, scoped to one client session; `clear` drops it on
//! logout. It is never transmitted in unwrapped form.
//!
//! Each tab/process that calls `initialize` fetches and unwraps
//! independently — that is idempotent and safe, but logout in one tab does
//! not clear another tab's cache without an external cross-tab signal.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use zeroize::Zeroize;

use confide_crypto::kdf::{derive_key, DerivedKey, CONTEXT_MASTER_KEY_WRAP, PBKDF2_ITERATIONS};
use confide_crypto::{IV_SIZE, KEY_SIZE, SALT_SIZE, TAG_SIZE};

use crate::error::ClientError;
use crate::transport::{KeyRecordTransport, WrappedKeyRecord};

/// A per-user 256-bit master key. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a fresh random master key (first use on any device).
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the wrapping key from the user's stable handle.
///
/// Same derivation as the server-side KDF (SHA-256 pre-hash + PBKDF2),
/// but with the handle as the secret input — the server knows the salt yet
/// never the handle-in-this-role, so it cannot compute this key.
fn derive_wrapping_key(user_handle: &str, salt: &[u8]) -> DerivedKey {
    derive_key(
        user_handle.as_bytes(),
        "",
        CONTEXT_MASTER_KEY_WRAP,
        salt,
        PBKDF2_ITERATIONS,
    )
}

/// Wrap a master key for server-side storage: fresh random salt and IV,
/// AES-256-GCM over the raw key bytes.
pub fn wrap_master_key(key: &MasterKey, user_handle: &str) -> Result<WrappedKeyRecord, ClientError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let wrapping_key = derive_wrapping_key(user_handle, &salt);
    let cipher = Aes256Gcm::new(wrapping_key.as_bytes().into());

    let encrypted_key = cipher
        .encrypt(Nonce::from_slice(&iv), key.as_bytes().as_slice())
        .map_err(|_| ClientError::InitializationFailure("key wrap failed".into()))?;

    Ok(WrappedKeyRecord {
        encrypted_key: BASE64.encode(&encrypted_key),
        salt: BASE64.encode(salt),
        iv: BASE64.encode(iv),
    })
}

/// Unwrap a stored record with the user's handle.
///
/// Fails with `UnwrapFailure` when the GCM tag check fails — a handle
/// mismatch or a tampered record.
pub fn unwrap_master_key(
    record: &WrappedKeyRecord,
    user_handle: &str,
) -> Result<MasterKey, ClientError> {
    let encrypted_key = BASE64
        .decode(&record.encrypted_key)
        .map_err(|e| ClientError::MalformedEnvelope(format!("encrypted_key: {e}")))?;
    let salt = BASE64
        .decode(&record.salt)
        .map_err(|e| ClientError::MalformedEnvelope(format!("salt: {e}")))?;
    let iv = BASE64
        .decode(&record.iv)
        .map_err(|e| ClientError::MalformedEnvelope(format!("iv: {e}")))?;

    if iv.len() != IV_SIZE || encrypted_key.len() != KEY_SIZE + TAG_SIZE {
        return Err(ClientError::MalformedEnvelope(format!(
            "unexpected field sizes: iv={}, encrypted_key={}",
            iv.len(),
            encrypted_key.len()
        )));
    }

    let wrapping_key = derive_wrapping_key(user_handle, &salt);
    let cipher = Aes256Gcm::new(wrapping_key.as_bytes().into());

    let mut plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), encrypted_key.as_slice())
        .map_err(|_| ClientError::UnwrapFailure)?;

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(MasterKey::from_bytes(bytes))
}

/// Holds the session-scoped master key and drives the fetch/generate
/// exchange with the server.
pub struct MasterKeyManager<T: KeyRecordTransport> {
    transport: T,
    key: Option<MasterKey>,
}

impl<T: KeyRecordTransport> MasterKeyManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            key: None,
        }
    }

    /// Fetch-or-create the master key for this user.
    ///
    /// Found: unwrap the stored record and cache the key. Not found (first
    /// use anywhere): generate, wrap, upload, cache. Any other server
    /// response is a hard `InitializationFailure` — callers must not
    /// proceed with unauthenticated encryption.
    pub async fn initialize(&mut self, user_handle: &str) -> Result<(), ClientError> {
        let fetched = self
            .transport
            .fetch()
            .await
            .map_err(|e| ClientError::InitializationFailure(e.to_string()))?;

        let key = match fetched {
            Some(record) => {
                let key = unwrap_master_key(&record, user_handle)?;
                tracing::debug!("master key unwrapped from stored record");
                key
            }
            None => {
                let key = MasterKey::generate();
                let record = wrap_master_key(&key, user_handle)?;
                self.transport
                    .store(&record)
                    .await
                    .map_err(|e| ClientError::InitializationFailure(e.to_string()))?;
                tracing::info!("generated and stored a new wrapped master key");
                key
            }
        };

        self.key = Some(key);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypt message content under the cached master key.
    ///
    /// The master key is already uniformly random, so there is no further
    /// derivation step here — direct AES-256-GCM with a fresh IV per call.
    /// Output: `base64(iv(12) ‖ tag(16) ‖ ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, ClientError> {
        let key = self.key.as_ref().ok_or(ClientError::NotInitialized)?;
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let combined = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| ClientError::AuthenticationFailure)?;

        // Reorder to iv || tag || ciphertext for the wire
        let tag_start = combined.len() - TAG_SIZE;
        let mut packed = Vec::with_capacity(IV_SIZE + combined.len());
        packed.extend_from_slice(&iv);
        packed.extend_from_slice(&combined[tag_start..]);
        packed.extend_from_slice(&combined[..tag_start]);

        Ok(BASE64.encode(&packed))
    }

    /// Decrypt message content under the cached master key.
    pub fn decrypt(&self, envelope: &str) -> Result<String, ClientError> {
        let key = self.key.as_ref().ok_or(ClientError::NotInitialized)?;

        let packed = BASE64
            .decode(envelope)
            .map_err(|e| ClientError::MalformedEnvelope(format!("invalid base64: {e}")))?;
        if packed.len() < IV_SIZE + TAG_SIZE {
            return Err(ClientError::MalformedEnvelope(format!(
                "envelope too short: {} bytes",
                packed.len()
            )));
        }

        let iv = &packed[..IV_SIZE];
        let auth_tag = &packed[IV_SIZE..IV_SIZE + TAG_SIZE];
        let ciphertext = &packed[IV_SIZE + TAG_SIZE..];

        let mut combined = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(auth_tag);

        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let plaintext = cipher
            .decrypt(Nonce::from_slice(iv), combined.as_slice())
            .map_err(|_| ClientError::AuthenticationFailure)?;

        String::from_utf8(plaintext).map_err(|_| ClientError::AuthenticationFailure)
    }

    /// Drop the cached key (logout). Encrypt/decrypt fail with
    /// `NotInitialized` until `initialize` runs again.
    pub fn clear(&mut self) {
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let key = MasterKey::generate();
        let record = wrap_master_key(&key, "@alice@example.com").unwrap();
        let unwrapped = unwrap_master_key(&record, "@alice@example.com").unwrap();
        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_unwrap_wrong_handle_fails() {
        let key = MasterKey::generate();
        let record = wrap_master_key(&key, "@alice@example.com").unwrap();
        let result = unwrap_master_key(&record, "@bob@example.com");
        assert!(matches!(result, Err(ClientError::UnwrapFailure)));
    }

    #[test]
    fn test_unwrap_tampered_record_fails() {
        let key = MasterKey::generate();
        let mut record = wrap_master_key(&key, "@alice@example.com").unwrap();

        let mut bytes = BASE64.decode(&record.encrypted_key).unwrap();
        bytes[0] ^= 0xFF;
        record.encrypted_key = BASE64.encode(&bytes);

        let result = unwrap_master_key(&record, "@alice@example.com");
        assert!(matches!(result, Err(ClientError::UnwrapFailure)));
    }

    #[tokio::test]
    async fn test_first_use_generates_and_stores() {
        let mut manager = MasterKeyManager::new(InMemoryTransport::new());
        manager.initialize("@alice@example.com").await.unwrap();

        assert!(manager.is_initialized());
        // The wrapped record landed on the "server"
        assert!(manager.transport.stored_record().is_some());
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_session() {
        let mut manager = MasterKeyManager::new(InMemoryTransport::new());
        manager.initialize("@alice@example.com").await.unwrap();

        let envelope = manager.encrypt("между нами").unwrap();
        assert_eq!(manager.decrypt(&envelope).unwrap(), "между нами");

        // Fresh IV per call
        let again = manager.encrypt("между нами").unwrap();
        assert_ne!(envelope, again);
    }

    #[tokio::test]
    async fn test_not_initialized_and_clear() {
        let mut manager = MasterKeyManager::new(InMemoryTransport::new());
        assert!(matches!(
            manager.encrypt("x"),
            Err(ClientError::NotInitialized)
        ));

        manager.initialize("@alice@example.com").await.unwrap();
        let envelope = manager.encrypt("x").unwrap();

        manager.clear();
        assert!(!manager.is_initialized());
        assert!(matches!(
            manager.decrypt(&envelope),
            Err(ClientError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_server_outage_is_hard_failure() {
        let transport = InMemoryTransport::new();
        transport.set_failing(true);
        let mut manager = MasterKeyManager::new(transport);

        let result = manager.initialize("@alice@example.com").await;
        assert!(matches!(result, Err(ClientError::InitializationFailure(_))));
        assert!(!manager.is_initialized());
    }
}
