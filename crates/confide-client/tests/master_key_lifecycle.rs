//! Cross-device master-key continuity: a second client unwraps the record
//! the first client stored and ends up with the same key.

use std::sync::Arc;

use confide_client::{
    open_stored, seal_outgoing, Author, ClientError, InMemoryTransport, MasterKeyManager,
};

const ALICE: &str = "@alice@example.com";

#[tokio::test]
async fn fresh_client_unwraps_stored_record() {
    // First session: generate + wrap + upload
    let server = Arc::new(InMemoryTransport::new());
    let mut first = MasterKeyManager::new(server.clone());
    first.initialize(ALICE).await.unwrap();

    let stored_message = seal_outgoing(&first, "see you tomorrow", Author::Human, false).unwrap();
    let record = server.stored_record().expect("record uploaded on first use");

    // Fresh client on another device: only the handle and the server record
    let mut second = MasterKeyManager::new(InMemoryTransport::with_record(record));
    second.initialize(ALICE).await.unwrap();

    // The unwrapped key decrypts content from the first session, and
    // content it encrypts is readable by the first session.
    assert_eq!(
        open_stored(&second, &stored_message).unwrap(),
        "see you tomorrow"
    );
    let from_second = second.encrypt("and you").unwrap();
    assert_eq!(first.decrypt(&from_second).unwrap(), "and you");
}

#[tokio::test]
async fn reinitialize_after_clear_restores_the_same_key() {
    let server = Arc::new(InMemoryTransport::new());
    let mut manager = MasterKeyManager::new(server.clone());
    manager.initialize(ALICE).await.unwrap();

    let envelope = manager.encrypt("before logout").unwrap();
    manager.clear();

    // Second login: fetch path this time, not generate
    manager.initialize(ALICE).await.unwrap();
    assert_eq!(manager.decrypt(&envelope).unwrap(), "before logout");
}

#[tokio::test]
async fn wrong_handle_cannot_unwrap() {
    let server = Arc::new(InMemoryTransport::new());
    let mut alice = MasterKeyManager::new(server.clone());
    alice.initialize(ALICE).await.unwrap();

    let record = server.stored_record().unwrap();
    let mut bob = MasterKeyManager::new(InMemoryTransport::with_record(record));
    let result = bob.initialize("@bob@example.com").await;

    assert!(matches!(result, Err(ClientError::UnwrapFailure)));
    assert!(!bob.is_initialized());
}
