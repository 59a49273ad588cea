//! Process-wide master secret for server-side message encryption.
//!
//! Loaded once at startup and passed explicitly into [`crate::MessageCipher`]
//! — never reached as an ambient global. There is no rotation path: changing
//! the secret without running a migration orphans every existing envelope.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use confide_core::config::EncryptionConfig;

use crate::error::CryptoError;

/// Domain prefix for the fallback derivation, so a key derived from the
/// application secret can never collide with another consumer of it.
const FALLBACK_DOMAIN: &str = "confide-message-encryption:";

/// The server's message-encryption master secret.
pub struct MasterSecret {
    value: SecretString,
}

impl MasterSecret {
    /// Load the master secret from configuration.
    ///
    /// Prefers the dedicated `master_secret`. When that is absent, derives
    /// one from the unrelated `fallback_app_secret` — a degraded posture
    /// that is warned about loudly, not a silent failure. Errors when
    /// neither is configured.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, CryptoError> {
        if let Some(secret) = &config.master_secret {
            return Ok(Self {
                value: SecretString::from(secret.expose_secret().to_owned()),
            });
        }

        if let Some(app_secret) = &config.fallback_app_secret {
            tracing::warn!(
                "encryption.master_secret is not set; deriving the message \
                 encryption key from the application secret. Configure a \
                 dedicated master_secret."
            );
            let mut hasher = Sha256::new();
            hasher.update(FALLBACK_DOMAIN.as_bytes());
            hasher.update(app_secret.expose_secret().as_bytes());
            let derived = hex_lower(&hasher.finalize());
            return Ok(Self {
                value: SecretString::from(derived),
            });
        }

        Err(CryptoError::MissingSecret(
            "set encryption.master_secret (or fallback_app_secret) in the config".into(),
        ))
    }

    /// Build directly from a secret value. Used by tests and by embedders
    /// that manage configuration themselves.
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::from(value.into()),
        }
    }

    pub(crate) fn expose_bytes(&self) -> &[u8] {
        self.value.expose_secret().as_bytes()
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecret")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        s.push_str(&format!("{byte:02x}"));
    }
    s
}
