//! Catalog backups with rotation
//!
//! Backups are taken with `VACUUM INTO`, which produces a consistent copy
//! even when the catalog runs in WAL mode. Files are named
//! `<stem>-<YYYYmmdd-HHMMSS-mmm>.db` so lexical order is chronological.

use crate::{Error, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Write a backup of the catalog into `backup_dir` and prune old ones
///
/// At most `retention_count` backups (including the new one) are kept.
pub async fn backup_database(
    pool: &SqlitePool,
    backup_dir: &Path,
    stem: &str,
    retention_count: usize,
) -> Result<PathBuf> {
    if retention_count == 0 {
        return Err(Error::Backup("retention_count must be at least 1".to_string()));
    }

    tokio::fs::create_dir_all(backup_dir).await?;

    let file_name = format!("{}-{}.db", stem, Utc::now().format("%Y%m%d-%H%M%S-%3f"));
    let target = backup_dir.join(file_name);
    if tokio::fs::try_exists(&target).await? {
        return Err(Error::Backup(format!("{} already exists", target.display())));
    }

    let target_str = target
        .to_str()
        .ok_or_else(|| Error::Backup(format!("non UTF-8 path {:?}", target)))?
        .to_string();

    sqlx::query("VACUUM INTO ?")
        .bind(target_str)
        .execute(pool)
        .await?;

    info!("Catalog backed up to {}", target.display());

    let removed = prune_backups(backup_dir, stem, retention_count).await?;
    if !removed.is_empty() {
        debug!(removed = removed.len(), "Pruned old catalog backups");
    }

    Ok(target)
}

/// List backups for `stem`, oldest first
pub async fn list_backups(backup_dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}-", stem);
    let mut backups = Vec::new();

    let mut entries = tokio::fs::read_dir(backup_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(&prefix) && name.ends_with(".db") && tokio::fs::metadata(&path).await?.is_file() {
            backups.push(path);
        }
    }

    backups.sort();
    Ok(backups)
}

/// Delete the oldest backups beyond `retention_count`, returning what was removed
pub async fn prune_backups(backup_dir: &Path, stem: &str, retention_count: usize) -> Result<Vec<PathBuf>> {
    let backups = list_backups(backup_dir, stem).await?;
    if backups.len() <= retention_count {
        return Ok(Vec::new());
    }

    let excess = backups.len() - retention_count;
    let mut removed = Vec::with_capacity(excess);
    for path in backups.into_iter().take(excess) {
        tokio::fs::remove_file(&path).await?;
        removed.push(path);
    }

    Ok(removed)
}
