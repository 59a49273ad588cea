//! confide-migrate: batch migration of v1 (fixed-salt) message envelopes to
//! the v2 (per-message random salt) scheme.
//!
//! Two phases, both idempotent and safe to re-run:
//! - **analyze** — classify every row as current / legacy / plaintext and
//!   report counts. No mutation.
//! - **migrate** — walk legacy rows in insertion order, decrypt with the v1
//!   derivation, re-encrypt with v2, persist in place. Per-row failures are
//!   counted and logged, never fatal: migrations run against live data and
//!   partial success beats an aborted run.
//!
//! Run one migrator instance at a time: the per-row read-modify-write is
//! not transactionally guarded against a second concurrent migrator.

pub mod engine;
pub mod store;

pub use engine::{analyze, migrate, AnalyzeReport, MigrationOptions, MigrationReport, RowOutcome};
pub use store::{MemoryStore, MessageRow, MessageStore, SqliteStore};
