//! The two migration phases: analyze (classify, report, no mutation) and
//! migrate (decrypt v1, re-encrypt v2, persist, continue past failures).

use anyhow::Result;
use std::time::{Duration, Instant};

use confide_crypto::{Envelope, Format, MessageCipher};

use crate::store::{MessageRow, MessageStore};

/// Knobs for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Rows per batch (default 100)
    pub batch_size: u64,
    /// Decrypt and re-encrypt but persist nothing; stops after the first
    /// batch — a time-bounded feasibility check, not a full simulation.
    /// Use analyze for full counts.
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            dry_run: false,
        }
    }
}

/// Classification counts from the analyze phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnalyzeReport {
    pub total: u64,
    pub current: u64,
    pub legacy: u64,
    pub plaintext: u64,
}

/// What happened to one legacy row.
#[derive(Debug)]
pub enum RowOutcome {
    /// Re-encrypted and persisted
    Migrated { id: String },
    /// Validated decrypt + re-encrypt, persistence skipped (dry run)
    Validated { id: String },
    /// Left untouched; the run continues
    Failed { id: String, reason: String },
}

/// Summary of a migration run.
#[derive(Debug)]
pub struct MigrationReport {
    pub migrated: u64,
    pub errors: u64,
    pub batches: u64,
    pub duration: Duration,
    pub dry_run: bool,
}

/// Scan every row and classify it by envelope format. No mutation.
pub async fn analyze(store: &dyn MessageStore, batch_size: u64) -> Result<AnalyzeReport> {
    let mut report = AnalyzeReport::default();
    let mut offset = 0u64;

    loop {
        let batch = store.fetch_batch(offset, batch_size).await?;
        if batch.is_empty() {
            break;
        }
        for row in &batch {
            report.total += 1;
            match Envelope::detect(&row.content) {
                Format::Current => report.current += 1,
                Format::Legacy => report.legacy += 1,
                Format::Plaintext => report.plaintext += 1,
            }
        }
        offset += batch.len() as u64;
    }

    tracing::info!(
        total = report.total,
        current = report.current,
        legacy = report.legacy,
        plaintext = report.plaintext,
        "analyze complete"
    );
    Ok(report)
}

/// Rewrite legacy rows to the current scheme, one batch at a time.
///
/// Batches are sequential and rows within a batch are processed one at a
/// time: the read-modify-write has no transactional guard, so bounded,
/// attributable progress wins over throughput here.
///
/// The pagination offset advances only past rows that stayed legacy
/// (failures): migrated rows drop out of the legacy filter, so advancing
/// past failures is what keeps a persistently-failing row from spinning
/// the loop without ever skipping a migratable one. The loop ends when a
/// batch comes back empty — after a clean run, a re-run sees zero legacy
/// rows immediately.
pub async fn migrate(
    store: &dyn MessageStore,
    cipher: &MessageCipher,
    options: &MigrationOptions,
    mut on_row: impl FnMut(&RowOutcome),
) -> Result<MigrationReport> {
    let started = Instant::now();
    let mut migrated = 0u64;
    let mut errors = 0u64;
    let mut batches = 0u64;
    let mut offset = 0u64;

    loop {
        let batch = store.fetch_legacy_batch(offset, options.batch_size).await?;
        if batch.is_empty() {
            break;
        }
        batches += 1;

        let mut stayed_legacy = 0u64;
        for row in &batch {
            let outcome = migrate_row(store, cipher, row, options.dry_run).await;
            match &outcome {
                RowOutcome::Migrated { id } => {
                    migrated += 1;
                    tracing::debug!(row = %id, "migrated");
                }
                RowOutcome::Validated { id } => {
                    migrated += 1;
                    stayed_legacy += 1;
                    tracing::debug!(row = %id, "validated (dry run)");
                }
                RowOutcome::Failed { id, reason } => {
                    errors += 1;
                    stayed_legacy += 1;
                    tracing::warn!(row = %id, %reason, "row migration failed, continuing");
                }
            }
            on_row(&outcome);
        }

        if options.dry_run {
            break;
        }
        offset += stayed_legacy;
    }

    let report = MigrationReport {
        migrated,
        errors,
        batches,
        duration: started.elapsed(),
        dry_run: options.dry_run,
    };
    tracing::info!(
        migrated = report.migrated,
        errors = report.errors,
        batches = report.batches,
        dry_run = report.dry_run,
        "migration run complete"
    );
    Ok(report)
}

/// Decrypt one legacy row with the v1 derivation, re-encrypt with v2, and
/// persist. Every failure mode maps to `RowOutcome::Failed`; the row is
/// left exactly as it was.
async fn migrate_row(
    store: &dyn MessageStore,
    cipher: &MessageCipher,
    row: &MessageRow,
    dry_run: bool,
) -> RowOutcome {
    let plaintext = match cipher.decrypt(&row.content, &row.owner_id) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            return RowOutcome::Failed {
                id: row.id.clone(),
                reason: format!("decrypt: {e}"),
            }
        }
    };

    let reencrypted = match cipher.encrypt(&plaintext, &row.owner_id) {
        Ok(text) => text,
        Err(e) => {
            return RowOutcome::Failed {
                id: row.id.clone(),
                reason: format!("re-encrypt: {e}"),
            }
        }
    };

    if dry_run {
        return RowOutcome::Validated { id: row.id.clone() };
    }

    match store.update_content(&row.id, &reencrypted).await {
        Ok(()) => RowOutcome::Migrated { id: row.id.clone() },
        Err(e) => RowOutcome::Failed {
            id: row.id.clone(),
            reason: format!("persist: {e}"),
        },
    }
}
