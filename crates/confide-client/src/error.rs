use thiserror::Error;

/// Failures from the client-side master-key and message layer.
///
/// These surface to calling UI code as rejected operations — e.g. block
/// sending until `initialize` succeeds again. End users never see these
/// raw; the application maps them to generic "message unavailable" or
/// "please re-login" states.
#[derive(Debug, Error)]
pub enum ClientError {
    /// GCM tag mismatch while unwrapping the stored master key: wrong
    /// handle or a tampered record.
    #[error("master key unwrap failed: handle mismatch or tampered record")]
    UnwrapFailure,

    /// `encrypt`/`decrypt` called before `initialize` (or after `clear`).
    #[error("master key not initialized")]
    NotInitialized,

    /// The server exchange for the wrapped key record failed for a reason
    /// other than "not found". Callers must not proceed with
    /// unauthenticated encryption.
    #[error("master key initialization failed: {0}")]
    InitializationFailure(String),

    /// A client message envelope did not parse (bad base64 or truncated).
    #[error("malformed message envelope: {0}")]
    MalformedEnvelope(String),

    /// GCM tag mismatch on message content: wrong key or corruption.
    #[error("message authentication failure")]
    AuthenticationFailure,
}
