//! Message storage contract for the migrator.
//!
//! The platform's relational layer is out of scope; the migrator only needs
//! batch reads, update-by-id, and the owning user id per row. The SQLite
//! implementation expects the platform's schema shape: a `messages` table
//! joined to `sessions` for the owner.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

use confide_crypto::envelope::LEGACY_TAG;

/// One chat message row as the migrator sees it.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub content: String,
    /// Owning user id, resolved through the message's session
    pub owner_id: String,
}

/// Read/update access to message rows, always in insertion order.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn total_rows(&self) -> Result<u64>;

    /// One batch over all rows (analyze scan).
    async fn fetch_batch(&self, offset: u64, limit: u64) -> Result<Vec<MessageRow>>;

    /// One batch over legacy-tagged rows only (migrate scan).
    async fn fetch_legacy_batch(&self, offset: u64, limit: u64) -> Result<Vec<MessageRow>>;

    /// Persist new content for one row id.
    async fn update_content(&self, id: &str, content: &str) -> Result<()>;
}

/// SQLite-backed store over the platform's `messages`/`sessions` tables.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening message database: {}", path.display()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create the schema. Fixture/test helper — the real database is owned
    /// by the platform's migration history.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                     id       TEXT PRIMARY KEY,
                     owner_id TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS messages (
                     id         TEXT PRIMARY KEY,
                     session_id TEXT NOT NULL REFERENCES sessions(id),
                     content    TEXT NOT NULL
                 );",
            )
            .context("initializing schema")?;
        Ok(())
    }

    /// Insert a session + message pair. Fixture/test helper.
    pub fn insert_message(
        &self,
        id: &str,
        session_id: &str,
        owner_id: &str,
        content: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO sessions (id, owner_id) VALUES (?1, ?2)",
            (session_id, owner_id),
        )?;
        conn.execute(
            "INSERT INTO messages (id, session_id, content) VALUES (?1, ?2, ?3)",
            (id, session_id, content),
        )?;
        Ok(())
    }

    fn select_rows(&self, filter_legacy: bool, offset: u64, limit: u64) -> Result<Vec<MessageRow>> {
        let conn = self.conn.lock();
        let sql = if filter_legacy {
            "SELECT m.id, m.content, s.owner_id
             FROM messages m JOIN sessions s ON s.id = m.session_id
             WHERE m.content LIKE ?1 || '%'
             ORDER BY m.rowid LIMIT ?2 OFFSET ?3"
        } else {
            "SELECT m.id, m.content, s.owner_id
             FROM messages m JOIN sessions s ON s.id = m.session_id
             ORDER BY m.rowid LIMIT ?1 OFFSET ?2"
        };
        let mut stmt = conn.prepare(sql).context("preparing batch query")?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(MessageRow {
                id: row.get(0)?,
                content: row.get(1)?,
                owner_id: row.get(2)?,
            })
        };
        let rows = if filter_legacy {
            stmt.query_map((LEGACY_TAG, limit, offset), map_row)
        } else {
            stmt.query_map((limit, offset), map_row)
        }
        .context("querying message batch")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("reading message batch")?;
        Ok(rows)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn total_rows(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: u64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .context("counting messages")?;
        Ok(count)
    }

    async fn fetch_batch(&self, offset: u64, limit: u64) -> Result<Vec<MessageRow>> {
        self.select_rows(false, offset, limit)
    }

    async fn fetch_legacy_batch(&self, offset: u64, limit: u64) -> Result<Vec<MessageRow>> {
        self.select_rows(true, offset, limit)
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<()> {
        let updated = self
            .conn
            .lock()
            .execute("UPDATE messages SET content = ?2 WHERE id = ?1", (id, content))
            .with_context(|| format!("updating message {id}"))?;
        anyhow::ensure!(updated == 1, "message {id} not found for update");
        Ok(())
    }
}

/// In-memory store for engine tests.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<MessageRow>>,
}

impl MemoryStore {
    pub fn new(rows: Vec<MessageRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn rows(&self) -> Vec<MessageRow> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn total_rows(&self) -> Result<u64> {
        Ok(self.rows.lock().len() as u64)
    }

    async fn fetch_batch(&self, offset: u64, limit: u64) -> Result<Vec<MessageRow>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_legacy_batch(&self, offset: u64, limit: u64) -> Result<Vec<MessageRow>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|row| row.content.starts_with(LEGACY_TAG))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<()> {
        let mut rows = self.rows.lock();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| anyhow::anyhow!("message {id} not found for update"))?;
        row.content = content.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("messages.db")).unwrap();
        store.init_schema().unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_sqlite_batches_in_insertion_order() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            store
                .insert_message(&format!("m{i}"), "s1", "user-1", &format!("ENC1:payload{i}"))
                .unwrap();
        }

        assert_eq!(store.total_rows().await.unwrap(), 5);

        let batch = store.fetch_legacy_batch(0, 2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, "m0");
        assert_eq!(batch[0].owner_id, "user-1");
        assert_eq!(batch[1].id, "m1");

        let batch = store.fetch_legacy_batch(4, 2).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "m4");
    }

    #[tokio::test]
    async fn test_sqlite_legacy_filter() {
        let (_dir, store) = temp_store();
        store.insert_message("m1", "s1", "u", "ENC1:old").unwrap();
        store.insert_message("m2", "s1", "u", "ENC2:new").unwrap();
        store.insert_message("m3", "s1", "u", "plain text").unwrap();

        let legacy = store.fetch_legacy_batch(0, 10).await.unwrap();
        assert_eq!(legacy.len(), 1);
        assert_eq!(legacy[0].id, "m1");

        let all = store.fetch_batch(0, 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_sqlite_update_content() {
        let (_dir, store) = temp_store();
        store.insert_message("m1", "s1", "u", "ENC1:old").unwrap();

        store.update_content("m1", "ENC2:rewritten").await.unwrap();
        let rows = store.fetch_batch(0, 10).await.unwrap();
        assert_eq!(rows[0].content, "ENC2:rewritten");

        assert!(store.update_content("missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_matches_contract() {
        let store = MemoryStore::new(vec![
            MessageRow { id: "a".into(), content: "ENC1:x".into(), owner_id: "u".into() },
            MessageRow { id: "b".into(), content: "plain".into(), owner_id: "u".into() },
        ]);

        assert_eq!(store.total_rows().await.unwrap(), 2);
        assert_eq!(store.fetch_legacy_batch(0, 10).await.unwrap().len(), 1);

        store.update_content("a", "ENC2:y").await.unwrap();
        assert_eq!(store.rows()[0].content, "ENC2:y");
    }
}
