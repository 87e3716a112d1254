//! Commit protocol
//!
//! The only point of durability of a run. Order of operations:
//! 1. Build the plan from the ledger (empty plan: nothing else happens)
//! 2. Describe every change
//! 3. Back up the catalog, rotating old backups
//! 4. Ask for confirmation (decline: store untouched)
//! 5. Apply the plan in one transaction, then write pending files
//!
//! A failed transaction leaves no files behind.
//!
//! The ledger is cleared whatever the outcome.

use crate::error::UnifyResult;
use crate::ledger::{CommitPlan, CommitSummary, MutationLedger};
use crate::store::CatalogStore;
use plexunify_common::db::backup_database;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Gate between describing the plan and writing it
pub trait Confirm {
    fn confirm(&mut self, summary: &CommitSummary) -> UnifyResult<bool>;
}

/// Interactive yes/no prompt on stdin
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, summary: &CommitSummary) -> UnifyResult<bool> {
        let mut stdout = std::io::stdout();
        write!(stdout, "Write {} to the catalog? [y/N] ", summary)?;
        stdout.flush()?;

        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Fixed answer (`--yes`, or confirmation disabled in the config)
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _summary: &CommitSummary) -> UnifyResult<bool> {
        Ok(self.0)
    }
}

/// Where backups go and whether anything may be written
#[derive(Debug, Clone)]
pub struct CommitOptions {
    pub backup_dir: PathBuf,
    /// Backup file name prefix
    pub backup_stem: String,
    pub retention_count: usize,
    pub dry_run: bool,
}

/// Result of one flush
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Nothing was staged; no backup, no prompt
    Empty,
    /// Plan described only
    DryRun(CommitSummary),
    /// User declined; backup taken, store untouched
    Declined(CommitSummary),
    Committed {
        summary: CommitSummary,
        backup: PathBuf,
        rows_affected: u64,
    },
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }
}

/// Flush the ledger
pub async fn flush(
    ledger: &mut MutationLedger,
    store: &CatalogStore,
    options: &CommitOptions,
    confirm: &mut dyn Confirm,
) -> UnifyResult<CommitOutcome> {
    let plan = ledger.plan();
    ledger.clear();

    if plan.is_empty() {
        info!("Nothing to commit");
        return Ok(CommitOutcome::Empty);
    }

    let summary = plan.summary();
    describe(&plan);

    if options.dry_run {
        info!(%summary, "Dry run, nothing written");
        return Ok(CommitOutcome::DryRun(summary));
    }

    let backup = backup_database(
        store.pool(),
        &options.backup_dir,
        &options.backup_stem,
        options.retention_count,
    )
    .await?;

    if !confirm.confirm(&summary)? {
        warn!("Commit declined, catalog left untouched");
        return Ok(CommitOutcome::Declined(summary));
    }

    let stamp = chrono::Utc::now().timestamp();
    let rows_affected = store.apply(&plan, stamp).await?;
    info!(%summary, rows_affected, "Changes committed");

    for artifact in &plan.artifacts {
        if let Some(parent) = artifact.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&artifact.path, &artifact.bytes).await?;
        debug!(path = %artifact.path.display(), bytes = artifact.bytes.len(), "File written");
    }

    Ok(CommitOutcome::Committed {
        summary,
        backup,
        rows_affected,
    })
}

fn describe(plan: &CommitPlan) {
    for line in plan.describe() {
        info!("{}", line);
    }
}
