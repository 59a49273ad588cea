//! Versioned ciphertext envelope codec.
//!
//! An envelope is a literal version tag followed by base64-encoded binary
//! fields in fixed order:
//!
//! | Version | Tag      | Payload layout                          |
//! |---------|----------|-----------------------------------------|
//! | v1      | `ENC1:`  | `iv(12) ‖ tag(16) ‖ ciphertext`         |
//! | v2      | `ENC2:`  | `salt(16) ‖ iv(12) ‖ tag(16) ‖ ciphertext` |
//!
//! The tag is checked before anything else is parsed. Text without a
//! recognized tag is never guessed at from content shape: `decode` rejects
//! it, `detect` reports it as `Plaintext` (historical unencrypted rows).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::CryptoError;
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// Literal prefix for v1 (legacy, global fixed KDF salt) envelopes.
pub const LEGACY_TAG: &str = "ENC1:";

/// Literal prefix for v2 (current, random per-message KDF salt) envelopes.
pub const CURRENT_TAG: &str = "ENC2:";

/// Envelope scheme version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// v1: fixed global KDF salt, no salt field in the payload
    Legacy,
    /// v2: random per-message KDF salt embedded in the payload
    Current,
}

impl Version {
    pub fn tag(self) -> &'static str {
        match self {
            Version::Legacy => LEGACY_TAG,
            Version::Current => CURRENT_TAG,
        }
    }

    /// Minimum payload length for this version's fixed-size fields.
    fn min_payload_len(self) -> usize {
        match self {
            Version::Legacy => IV_SIZE + TAG_SIZE,
            Version::Current => SALT_SIZE + IV_SIZE + TAG_SIZE,
        }
    }
}

/// Result of permissive format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Legacy,
    Current,
    /// No recognized version tag — treated as a historical unencrypted row
    /// by read paths, never decrypted.
    Plaintext,
}

/// A decoded ciphertext envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub version: Version,
    /// Present in v2 only
    pub salt: Option<[u8; SALT_SIZE]>,
    pub iv: [u8; IV_SIZE],
    pub auth_tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Serialize to the transport text form: version tag + base64 payload.
    pub fn encode(&self) -> String {
        let salt_len = self.salt.map_or(0, |s| s.len());
        let mut payload =
            Vec::with_capacity(salt_len + IV_SIZE + TAG_SIZE + self.ciphertext.len());
        if let Some(salt) = &self.salt {
            payload.extend_from_slice(salt);
        }
        payload.extend_from_slice(&self.iv);
        payload.extend_from_slice(&self.auth_tag);
        payload.extend_from_slice(&self.ciphertext);

        format!("{}{}", self.version.tag(), BASE64.encode(&payload))
    }

    /// Parse an envelope from its transport text form.
    ///
    /// Fails with `MalformedEnvelope` if the text does not start with a
    /// recognized version tag, the base64 payload does not decode, or the
    /// decoded payload is shorter than the version's fixed-size fields.
    pub fn decode(text: &str) -> Result<Self, CryptoError> {
        let (version, encoded) = if let Some(rest) = text.strip_prefix(CURRENT_TAG) {
            (Version::Current, rest)
        } else if let Some(rest) = text.strip_prefix(LEGACY_TAG) {
            (Version::Legacy, rest)
        } else {
            return Err(CryptoError::MalformedEnvelope(
                "missing version tag".into(),
            ));
        };

        let payload = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("invalid base64: {e}")))?;

        if payload.len() < version.min_payload_len() {
            return Err(CryptoError::MalformedEnvelope(format!(
                "payload too short: {} bytes (minimum {} for {})",
                payload.len(),
                version.min_payload_len(),
                version.tag(),
            )));
        }

        let mut rest = &payload[..];
        let salt = match version {
            Version::Current => {
                let mut salt = [0u8; SALT_SIZE];
                salt.copy_from_slice(&rest[..SALT_SIZE]);
                rest = &rest[SALT_SIZE..];
                Some(salt)
            }
            Version::Legacy => None,
        };

        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&rest[..IV_SIZE]);
        rest = &rest[IV_SIZE..];

        let mut auth_tag = [0u8; TAG_SIZE];
        auth_tag.copy_from_slice(&rest[..TAG_SIZE]);
        rest = &rest[TAG_SIZE..];

        Ok(Self {
            version,
            salt,
            iv,
            auth_tag,
            ciphertext: rest.to_vec(),
        })
    }

    /// Permissive tag sniffing: which format does this text claim to be?
    ///
    /// Returns `Format::Plaintext` for anything without a recognized tag,
    /// including the empty string. Never inspects the payload.
    pub fn detect(text: &str) -> Format {
        if text.starts_with(CURRENT_TAG) {
            Format::Current
        } else if text.starts_with(LEGACY_TAG) {
            Format::Legacy
        } else {
            Format::Plaintext
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_current() -> Envelope {
        Envelope {
            version: Version::Current,
            salt: Some([0x11; SALT_SIZE]),
            iv: [0x22; IV_SIZE],
            auth_tag: [0x33; TAG_SIZE],
            ciphertext: vec![0xAA, 0xBB, 0xCC],
        }
    }

    #[test]
    fn test_encode_decode_current() {
        let envelope = sample_current();
        let text = envelope.encode();
        assert!(text.starts_with(CURRENT_TAG));

        let decoded = Envelope::decode(&text).unwrap();
        assert_eq!(decoded.version, Version::Current);
        assert_eq!(decoded.salt, Some([0x11; SALT_SIZE]));
        assert_eq!(decoded.iv, [0x22; IV_SIZE]);
        assert_eq!(decoded.auth_tag, [0x33; TAG_SIZE]);
        assert_eq!(decoded.ciphertext, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_encode_decode_legacy() {
        let envelope = Envelope {
            version: Version::Legacy,
            salt: None,
            iv: [7; IV_SIZE],
            auth_tag: [8; TAG_SIZE],
            ciphertext: b"payload".to_vec(),
        };
        let text = envelope.encode();
        assert!(text.starts_with(LEGACY_TAG));

        let decoded = Envelope::decode(&text).unwrap();
        assert_eq!(decoded.version, Version::Legacy);
        assert!(decoded.salt.is_none());
        assert_eq!(decoded.ciphertext, b"payload");
    }

    #[test]
    fn test_empty_ciphertext_allowed() {
        // Empty plaintext encrypts to an empty GCM ciphertext; the envelope
        // still carries salt + iv + tag.
        let mut envelope = sample_current();
        envelope.ciphertext = Vec::new();

        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert!(decoded.ciphertext.is_empty());
    }

    #[test]
    fn test_decode_missing_tag() {
        let result = Envelope::decode("just some plain text");
        assert!(matches!(result, Err(CryptoError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_decode_bad_base64() {
        let result = Envelope::decode("ENC2:!!!not-base64!!!");
        assert!(matches!(result, Err(CryptoError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_decode_truncated_payload() {
        // Valid base64, but fewer bytes than salt + iv + tag
        let short = format!("ENC2:{}", BASE64.encode([0u8; 10]));
        let result = Envelope::decode(&short);
        assert!(matches!(result, Err(CryptoError::MalformedEnvelope(_))));

        // The same payload is long enough for v1 (iv + tag = 28)... but 10
        // bytes is still short
        let short = format!("ENC1:{}", BASE64.encode([0u8; 10]));
        assert!(Envelope::decode(&short).is_err());
    }

    #[test]
    fn test_detect() {
        assert_eq!(Envelope::detect(&sample_current().encode()), Format::Current);
        assert_eq!(Envelope::detect("ENC1:AAAA"), Format::Legacy);
        assert_eq!(Envelope::detect("plain text"), Format::Plaintext);
        assert_eq!(Envelope::detect(""), Format::Plaintext);
        // Never guesses from shape: base64-looking text without a tag is plaintext
        assert_eq!(Envelope::detect("aGVsbG8gd29ybGQ="), Format::Plaintext);
    }
}
