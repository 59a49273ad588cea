//! confide-migrate: rewrite v1 (fixed-salt) message envelopes to v2.
//!
//! Typical usage:
//!   confide-migrate --analyze-only          # counts only, no mutation
//!   confide-migrate --dry-run               # validate the first batch
//!   confide-migrate --batch-size=250 -v     # the real thing
//!
//! Exit codes: 0 on completion (even with per-row failures — they are
//! reported, not fatal), 1 on setup-level failure (bad config, cannot open
//! the database), 2 when --fail-on-errors is set and rows failed.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use confide_core::ConfideConfig;
use confide_crypto::{MasterSecret, MessageCipher};
use confide_migrate::{analyze, migrate, MigrationOptions, RowOutcome, SqliteStore};

#[derive(Parser, Debug)]
#[command(
    name = "confide-migrate",
    version,
    about = "Migrate legacy-format encrypted messages to the current scheme"
)]
struct Cli {
    /// Path to confide.toml configuration file
    #[arg(long, short = 'c', env = "CONFIDE_CONFIG", default_value = "confide.toml")]
    config: PathBuf,

    /// Message database path (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Decrypt and re-encrypt the first batch without persisting anything
    #[arg(long)]
    dry_run: bool,

    /// Report classification counts and exit without mutating
    #[arg(long)]
    analyze_only: bool,

    /// Rows per batch
    #[arg(long)]
    batch_size: Option<u64>,

    /// Skip the operator-cancellation delay
    #[arg(long, short = 'y')]
    yes: bool,

    /// Exit non-zero when any row failed to migrate
    #[arg(long)]
    fail_on_errors: bool,

    /// Verbose logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;
    let database = cli
        .database
        .unwrap_or_else(|| config.migration.database.clone());
    let batch_size = cli.batch_size.unwrap_or(config.migration.batch_size as u64);
    anyhow::ensure!(batch_size > 0, "batch size must be at least 1");

    let store = SqliteStore::open(&database)?;
    let cipher = MessageCipher::new(
        MasterSecret::from_config(&config.encryption).context("loading master secret")?,
    );

    // Phase 1: analyze (always; it is also the dry assessment --dry-run
    // deliberately does not provide)
    let counts = analyze(&store, batch_size).await?;
    println!(
        "{} rows: {} current, {} legacy, {} plaintext",
        counts.total, counts.current, counts.legacy, counts.plaintext
    );

    if cli.analyze_only || counts.legacy == 0 {
        if counts.legacy == 0 {
            println!("nothing to migrate");
        }
        return Ok(());
    }

    // Confirmation gate before the first destructive batch
    if !cli.dry_run && !cli.yes && std::env::var_os("CI").is_none() {
        let delay = config.migration.confirm_delay_secs;
        println!(
            "migrating {} legacy rows in {delay}s — Ctrl-C to cancel",
            counts.legacy
        );
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    // Phase 2: migrate
    let progress = ProgressBar::new(if cli.dry_run {
        counts.legacy.min(batch_size)
    } else {
        counts.legacy
    });
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .context("progress bar template")?,
    );

    let options = MigrationOptions {
        batch_size,
        dry_run: cli.dry_run,
    };
    let mut failures: Vec<(String, String)> = Vec::new();
    let report = migrate(&store, &cipher, &options, |outcome| {
        progress.inc(1);
        if let RowOutcome::Failed { id, reason } = outcome {
            failures.push((id.clone(), reason.clone()));
        }
    })
    .await?;
    progress.finish_and_clear();

    let verb = if report.dry_run { "validated" } else { "migrated" };
    println!(
        "{verb} {} rows, {} errors, {} batches in {:.1?}",
        report.migrated, report.errors, report.batches, report.duration
    );
    for (id, reason) in &failures {
        println!("  failed {id}: {reason}");
    }
    if report.dry_run {
        println!("dry run: nothing was persisted (first batch only)");
    }

    if cli.fail_on_errors && report.errors > 0 {
        std::process::exit(2);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<ConfideConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(ConfideConfig::default())
    }
}
