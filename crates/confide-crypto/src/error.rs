use thiserror::Error;

/// Failures from envelope decoding and message encryption/decryption.
///
/// `AuthenticationFailure` and `MalformedEnvelope` must always propagate to
/// the caller — returning ciphertext or garbage as if it were plaintext is
/// a confidentiality and integrity violation, so nothing in this crate
/// catches and ignores them.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Text carried a recognized version tag but the payload did not parse
    /// (bad base64, or shorter than that version's fixed-size fields).
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Text carried no recognized version tag. `decrypt` and `version_of`
    /// are strict and refuse such input; use `Envelope::detect` /
    /// `is_encrypted` for the permissive plaintext-tolerant read.
    #[error("unrecognized ciphertext format")]
    UnrecognizedFormat,

    /// GCM tag verification failed: wrong principal id, corrupted
    /// ciphertext, or version confusion.
    #[error("authentication failure: wrong key or corrupted ciphertext")]
    AuthenticationFailure,

    /// Decrypted bytes were not valid UTF-8. Only reachable with a key
    /// collision or a non-text payload, but kept distinct from
    /// `AuthenticationFailure` because the tag did verify.
    #[error("decrypted content is not valid UTF-8")]
    InvalidPlaintext,

    /// No usable master secret: neither a dedicated secret nor a fallback
    /// application secret is configured.
    #[error("no master secret configured: {0}")]
    MissingSecret(String),
}
