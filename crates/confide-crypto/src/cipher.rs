//! Server-side message cipher: AES-256-GCM over versioned envelopes.
//!
//! Encryption always writes v2 (random per-message salt). Decryption
//! dispatches on the decoded envelope version, so v1 rows stay readable
//! until the migration tool rewrites them.
//!
//! Operations are synchronous and stateless apart from randomness; the only
//! shared state is the [`MasterSecret`], read-only after load, so a single
//! cipher is safe to share across request-handling tasks.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::envelope::{Envelope, Format, Version};
use crate::error::CryptoError;
use crate::kdf::{derive_key, CONTEXT_MESSAGE, LEGACY_SALT, PBKDF2_ITERATIONS};
use crate::secret::MasterSecret;
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// One row for [`MessageCipher::decrypt_all`]: content plus an optional
/// per-row principal override.
pub struct RowToDecrypt<'a> {
    pub content: &'a str,
    pub principal_id: Option<&'a str>,
}

/// Encrypts and decrypts chat message content under the process-wide
/// master secret.
pub struct MessageCipher {
    secret: MasterSecret,
}

impl MessageCipher {
    pub fn new(secret: MasterSecret) -> Self {
        Self { secret }
    }

    /// Encrypt plaintext for a principal, producing a v2 envelope.
    ///
    /// Fresh random salt (16 bytes) and IV (12 bytes) per call: two
    /// encryptions of the same plaintext never produce the same text.
    pub fn encrypt(&self, plaintext: &str, principal_id: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);

        let key = derive_key(
            self.secret.expose_bytes(),
            principal_id,
            CONTEXT_MESSAGE,
            &salt,
            PBKDF2_ITERATIONS,
        );

        let (iv, auth_tag, ciphertext) = gcm_encrypt(key.as_bytes(), plaintext.as_bytes())?;
        Ok(Envelope {
            version: Version::Current,
            salt: Some(salt),
            iv,
            auth_tag,
            ciphertext,
        }
        .encode())
    }

    /// Encrypt with the v1 scheme (global fixed salt).
    ///
    /// Never used for new writes — it exists for migration fixtures and
    /// backfill tooling that must produce legacy-format rows.
    pub fn encrypt_legacy(
        &self,
        plaintext: &str,
        principal_id: &str,
    ) -> Result<String, CryptoError> {
        let key = derive_key(
            self.secret.expose_bytes(),
            principal_id,
            CONTEXT_MESSAGE,
            LEGACY_SALT,
            PBKDF2_ITERATIONS,
        );

        let (iv, auth_tag, ciphertext) = gcm_encrypt(key.as_bytes(), plaintext.as_bytes())?;
        Ok(Envelope {
            version: Version::Legacy,
            salt: None,
            iv,
            auth_tag,
            ciphertext,
        }
        .encode())
    }

    /// Decrypt an envelope for a principal.
    ///
    /// Strict: text without a recognized version tag fails with
    /// `UnrecognizedFormat` — it is never passed through as plaintext.
    /// A GCM tag mismatch (wrong principal, corruption, version confusion)
    /// fails with `AuthenticationFailure`.
    pub fn decrypt(&self, envelope_text: &str, principal_id: &str) -> Result<String, CryptoError> {
        if Envelope::detect(envelope_text) == Format::Plaintext {
            return Err(CryptoError::UnrecognizedFormat);
        }
        let envelope = Envelope::decode(envelope_text)?;

        let salt: &[u8] = match &envelope.salt {
            Some(salt) => salt,
            None => LEGACY_SALT,
        };
        let key = derive_key(
            self.secret.expose_bytes(),
            principal_id,
            CONTEXT_MESSAGE,
            salt,
            PBKDF2_ITERATIONS,
        );

        let plaintext = gcm_decrypt(key.as_bytes(), &envelope)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidPlaintext)
    }

    /// Permissive inspection: does this text carry a recognized version tag?
    ///
    /// Returns `false` for plain text and the empty string. Contrast with
    /// [`MessageCipher::version_of`], which treats the same inputs as an
    /// error — read paths use this, strict decode paths use that.
    pub fn is_encrypted(text: &str) -> bool {
        Envelope::detect(text) != Format::Plaintext
    }

    /// Strict version inspection: fails with `UnrecognizedFormat` when no
    /// version tag is present.
    pub fn version_of(text: &str) -> Result<Version, CryptoError> {
        match Envelope::detect(text) {
            Format::Legacy => Ok(Version::Legacy),
            Format::Current => Ok(Version::Current),
            Format::Plaintext => Err(CryptoError::UnrecognizedFormat),
        }
    }

    /// Decrypt many rows under one viewer context.
    ///
    /// Each row may override the default principal id. Historical
    /// unencrypted rows pass through unchanged; cipher failures stay
    /// per-row so one bad row cannot suppress the rest of a conversation.
    pub fn decrypt_all(
        &self,
        rows: &[RowToDecrypt<'_>],
        default_principal_id: &str,
    ) -> Vec<Result<String, CryptoError>> {
        rows.iter()
            .map(|row| {
                if !Self::is_encrypted(row.content) {
                    return Ok(row.content.to_string());
                }
                let principal = row.principal_id.unwrap_or(default_principal_id);
                self.decrypt(row.content, principal)
            })
            .collect()
    }
}

/// AES-256-GCM encrypt with a fresh random IV.
///
/// The aead crate emits `ciphertext ‖ tag`; the envelope stores the tag
/// before the ciphertext, so the tag is split off here.
fn gcm_encrypt(
    key: &[u8; 32],
    plaintext: &[u8],
) -> Result<([u8; IV_SIZE], [u8; TAG_SIZE], Vec<u8>), CryptoError> {
    let cipher = Aes256Gcm::new(key.into());

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let mut combined = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    let tag_start = combined.len() - TAG_SIZE;
    let mut auth_tag = [0u8; TAG_SIZE];
    auth_tag.copy_from_slice(&combined[tag_start..]);
    combined.truncate(tag_start);

    Ok((iv, auth_tag, combined))
}

/// AES-256-GCM decrypt with tag verification.
fn gcm_decrypt(key: &[u8; 32], envelope: &Envelope) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Nonce::from_slice(&envelope.iv);

    let mut combined = Vec::with_capacity(envelope.ciphertext.len() + TAG_SIZE);
    combined.extend_from_slice(&envelope.ciphertext);
    combined.extend_from_slice(&envelope.auth_tag);

    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailure)
}
