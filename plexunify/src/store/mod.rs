//! Catalog store adapter
//!
//! Read queries over the Plex library database plus the single
//! transactional write entry point ([`CatalogStore::apply`], in `apply.rs`).
//! Plex leaves many text columns NULL; they are read as empty strings.

mod apply;

use crate::error::{UnifyError, UnifyResult};
use crate::locks::FieldLocks;
use crate::types::{
    ExternalIds, MediaKind, MediaRecord, METADATA_TYPE_COLLECTION, METADATA_TYPE_MOVIE,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const RECORD_COLUMNS: &str = r#"
    id, library_section_id, metadata_type, guid, title, title_sort, original_title,
    tagline, content_rating, summary, user_thumb_url, "index", user_fields
"#;

/// Plex catalog accessed through one pooled connection
#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Id of the library section called `name`
    pub async fn resolve_section(&self, name: &str) -> UnifyResult<i64> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM library_sections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        id.ok_or_else(|| UnifyError::Catalog(format!("Library section '{}' not found", name)))
    }

    /// Movies of a section, in the order they are processed
    pub async fn movies(&self, section_id: i64, limit: Option<u32>) -> UnifyResult<Vec<MediaRecord>> {
        let sql = format!(
            "SELECT {} FROM metadata_items
             WHERE library_section_id = ? AND metadata_type = ?
             ORDER BY title DESC, id
             LIMIT ?",
            RECORD_COLUMNS
        );

        // SQLite treats a negative limit as unbounded
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query(&sql)
            .bind(section_id)
            .bind(METADATA_TYPE_MOVIE)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// One movie or collection by id
    pub async fn record(&self, id: i64) -> UnifyResult<Option<MediaRecord>> {
        let sql = format!(
            "SELECT {} FROM metadata_items WHERE id = ? AND metadata_type IN (?, ?)",
            RECORD_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(METADATA_TYPE_MOVIE)
            .bind(METADATA_TYPE_COLLECTION)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Collections of a section whose title matches exactly
    pub async fn collections_titled(&self, section_id: i64, title: &str) -> UnifyResult<Vec<MediaRecord>> {
        let sql = format!(
            "SELECT {} FROM metadata_items
             WHERE library_section_id = ? AND metadata_type = ? AND title = ?
             ORDER BY id",
            RECORD_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(section_id)
            .bind(METADATA_TYPE_COLLECTION)
            .bind(title)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// All tags of one taxonomy as (id, name)
    pub async fn tag_catalog(&self, tag_type: i64) -> UnifyResult<Vec<(i64, String)>> {
        let rows = sqlx::query("SELECT id, tag FROM tags WHERE tag_type = ? ORDER BY id")
            .bind(tag_type)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: Option<String> = row.get("tag");
                (row.get("id"), name.unwrap_or_default())
            })
            .collect())
    }

    /// Memberships of one record in one taxonomy as (tagging id, tag id)
    pub async fn memberships(&self, metadata_item_id: i64, tag_type: i64) -> UnifyResult<Vec<(i64, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT taggings.id AS tagging_id, taggings.tag_id AS tag_id
            FROM taggings
            JOIN tags ON tags.id = taggings.tag_id
            WHERE taggings.metadata_item_id = ? AND tags.tag_type = ?
            ORDER BY taggings.id
            "#,
        )
        .bind(metadata_item_id)
        .bind(tag_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("tagging_id"), row.get("tag_id")))
            .collect())
    }

    /// Records tagged with `tag_id`, in membership order
    pub async fn tag_members(&self, tag_id: i64) -> UnifyResult<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT metadata_item_id FROM taggings WHERE tag_id = ? ORDER BY id")
            .bind(tag_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    pub async fn has_membership(&self, metadata_item_id: i64, tag_id: i64) -> UnifyResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM taggings WHERE metadata_item_id = ? AND tag_id = ? LIMIT 1")
                .bind(metadata_item_id)
                .bind(tag_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }
}

fn record_from_row(row: &SqliteRow) -> UnifyResult<MediaRecord> {
    let id: i64 = row.get("id");
    let metadata_type: i64 = row.get("metadata_type");
    let kind = match metadata_type {
        METADATA_TYPE_MOVIE => MediaKind::Movie,
        METADATA_TYPE_COLLECTION => MediaKind::Collection,
        other => {
            return Err(UnifyError::Catalog(format!(
                "metadata_items #{} has unsupported metadata_type {}",
                id, other
            )))
        }
    };

    let text = |column: &str| -> String {
        row.get::<Option<String>, _>(column).unwrap_or_default()
    };

    let guid = text("guid");
    let external = ExternalIds::from_guid(&guid).unwrap_or_default();

    Ok(MediaRecord {
        id,
        kind,
        library_section_id: row.get::<Option<i64>, _>("library_section_id").unwrap_or_default(),
        guid,
        title: text("title"),
        title_sort: text("title_sort"),
        original_title: text("original_title"),
        tagline: text("tagline"),
        content_rating: text("content_rating"),
        summary: text("summary"),
        user_thumb_url: text("user_thumb_url"),
        index: row.get("index"),
        external,
        locks: FieldLocks::parse(&text("user_fields")),
    })
}
