//! Transactional application of a commit plan

use super::CatalogStore;
use crate::error::UnifyResult;
use crate::ledger::{CommitPlan, FieldValue, RowUpdate, Table};
use crate::types::METADATA_TYPE_DELETED;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

/// Column receiving the commit timestamp on updated rows
fn stamp_column(table: Table) -> Option<&'static str> {
    match table {
        Table::MetadataItems | Table::Tags => Some("updated_at"),
        // Plex taggings only carry created_at
        Table::Taggings => None,
    }
}

impl CatalogStore {
    /// Apply every change of `plan` in one transaction
    ///
    /// Order: row updates, new memberships, membership removals, collection
    /// deletions. `stamp` (seconds since the epoch) is written to `updated_at`
    /// of every updated row and `created_at` of every inserted membership.
    /// Returns the number of affected rows. Nothing is written if any
    /// statement fails.
    pub async fn apply(&self, plan: &CommitPlan, stamp: i64) -> UnifyResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;

        for update in &plan.updates {
            affected += apply_update(&mut tx, update, stamp).await?;
        }

        for insertion in &plan.insertions {
            let result = sqlx::query(
                r#"
                INSERT INTO taggings (metadata_item_id, tag_id, "index", created_at)
                SELECT ?, ?, COALESCE((SELECT MAX("index") + 1 FROM taggings WHERE tag_id = ?), 0), ?
                WHERE NOT EXISTS (
                    SELECT 1 FROM taggings WHERE metadata_item_id = ? AND tag_id = ?
                )
                "#,
            )
            .bind(insertion.metadata_item_id)
            .bind(insertion.tag_id)
            .bind(insertion.tag_id)
            .bind(stamp)
            .bind(insertion.metadata_item_id)
            .bind(insertion.tag_id)
            .execute(&mut *tx)
            .await?;
            affected += result.rows_affected();
        }

        for tagging_id in &plan.removals {
            let result = sqlx::query("DELETE FROM taggings WHERE id = ?")
                .bind(*tagging_id)
                .execute(&mut *tx)
                .await?;
            affected += result.rows_affected();
        }

        for deletion in &plan.deletions {
            let result = sqlx::query("UPDATE metadata_items SET metadata_type = ?, updated_at = ? WHERE id = ?")
                .bind(METADATA_TYPE_DELETED)
                .bind(stamp)
                .bind(deletion.collection_id)
                .execute(&mut *tx)
                .await?;
            affected += result.rows_affected();

            if let Some(tag_id) = deletion.tag_id {
                let memberships = sqlx::query("DELETE FROM taggings WHERE tag_id = ?")
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await?;
                let tag = sqlx::query("DELETE FROM tags WHERE id = ?")
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await?;
                affected += memberships.rows_affected() + tag.rows_affected();
            }
        }

        tx.commit().await?;
        debug!(affected, stamp, "Commit plan applied");
        Ok(affected)
    }
}

async fn apply_update(tx: &mut Transaction<'_, Sqlite>, update: &RowUpdate, stamp: i64) -> UnifyResult<u64> {
    let table = update.target.table();
    let mut assignments: Vec<String> = update
        .changes
        .iter()
        .map(|(column, _)| format!("{} = ?", column.name()))
        .collect();
    let stamp_column = stamp_column(table);
    if let Some(column) = stamp_column {
        assignments.push(format!("{} = ?", column));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?",
        table.name(),
        assignments.join(", ")
    );

    let mut query = sqlx::query(&sql);
    for (_, value) in &update.changes {
        query = match value {
            FieldValue::Text(text) => query.bind(text.clone()),
            FieldValue::Integer(number) => query.bind(*number),
        };
    }
    if stamp_column.is_some() {
        query = query.bind(stamp);
    }
    query = query.bind(update.target.id());

    let result = query.execute(&mut **tx).await?;
    Ok(result.rows_affected())
}
