//! Deletion Queue
//!
//! A deleted collection keeps its `metadata_items` row; it is reclassified to
//! the sentinel type and loses its collection tag and every membership.

use crate::ledger::{CollectionDeletion, MutationLedger};
use crate::types::MediaRecord;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

/// How a collection's lock count is compared to the threshold
///
/// The default (`less_than` with threshold 1) deletes only collections the
/// user never locked anything on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockComparison {
    /// Qualifies when `lock count < threshold`
    #[default]
    LessThan,
    /// Qualifies when `lock count > threshold`
    GreaterThan,
}

impl LockComparison {
    pub fn qualifies(self, lock_count: usize, threshold: usize) -> bool {
        match self {
            LockComparison::LessThan => lock_count < threshold,
            LockComparison::GreaterThan => lock_count > threshold,
        }
    }
}

impl fmt::Display for LockComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockComparison::LessThan => write!(f, "<"),
            LockComparison::GreaterThan => write!(f, ">"),
        }
    }
}

/// Stage deletion of `collection` if its lock count qualifies
///
/// Returns true when a deletion was newly staged.
pub fn queue_for_deletion(
    ledger: &mut MutationLedger,
    collection: &MediaRecord,
    threshold: usize,
    comparison: LockComparison,
) -> bool {
    let lock_count = collection.locks.count();

    if !comparison.qualifies(lock_count, threshold) {
        debug!(
            collection = %collection.title,
            lock_count,
            threshold,
            comparison = %comparison,
            "Collection protected by its locks"
        );
        return false;
    }

    let staged = ledger.stage_deletion(CollectionDeletion {
        collection_id: collection.id,
        tag_id: collection.index,
        title: collection.title.clone(),
    });

    if staged {
        info!(collection = %collection.title, id = collection.id, "Queued collection for deletion");
    }
    staged
}
