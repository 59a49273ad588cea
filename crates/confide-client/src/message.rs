//! Message encryption policy: which content gets the E2E layer.
//!
//! Human-authored content in conversations that are not AI-exclusive is
//! encrypted under the session master key. Assistant-authored content must
//! stay readable by the AI backend, so it always bypasses this layer —
//! even inside an otherwise-encrypted conversation. The stored message
//! carries an explicit `encrypted` flag so the read path never has to
//! guess.

use crate::error::ClientError;
use crate::master_key::MasterKeyManager;
use crate::transport::KeyRecordTransport;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    Human,
    Assistant,
}

/// A message as persisted: content (cipher or plain) plus the flag that
/// tells the read path which it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub content: String,
    pub encrypted: bool,
}

/// Prepare outgoing content for storage.
///
/// Encrypts only human-authored content in non-AI-exclusive conversations;
/// everything else passes through with `encrypted: false`.
pub fn seal_outgoing<T: KeyRecordTransport>(
    manager: &MasterKeyManager<T>,
    content: &str,
    author: Author,
    ai_exclusive_conversation: bool,
) -> Result<StoredMessage, ClientError> {
    if author == Author::Assistant || ai_exclusive_conversation {
        return Ok(StoredMessage {
            content: content.to_string(),
            encrypted: false,
        });
    }

    Ok(StoredMessage {
        content: manager.encrypt(content)?,
        encrypted: true,
    })
}

/// Recover readable content from a stored message.
///
/// Unencrypted messages pass through unchanged; encrypted ones require an
/// initialized master key.
pub fn open_stored<T: KeyRecordTransport>(
    manager: &MasterKeyManager<T>,
    message: &StoredMessage,
) -> Result<String, ClientError> {
    if !message.encrypted {
        return Ok(message.content.clone());
    }
    manager.decrypt(&message.content)
}
