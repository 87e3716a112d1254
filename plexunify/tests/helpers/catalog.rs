//! Fixture catalog with the subset of the Plex schema plexunify touches

use plexunify::{CatalogStore, UnifyConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use tempfile::TempDir;

const SCHEMA: &[&str] = &[
    "CREATE TABLE library_sections (id INTEGER PRIMARY KEY, name TEXT)",
    r#"CREATE TABLE metadata_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        library_section_id INTEGER,
        metadata_type INTEGER,
        guid TEXT,
        title TEXT,
        title_sort TEXT,
        original_title TEXT,
        tagline TEXT,
        content_rating TEXT,
        summary TEXT,
        user_thumb_url TEXT,
        "index" INTEGER,
        user_fields TEXT,
        updated_at INTEGER
    )"#,
    r#"CREATE TABLE tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tag TEXT,
        tag_type INTEGER,
        updated_at INTEGER
    )"#,
    r#"CREATE TABLE taggings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        metadata_item_id INTEGER,
        tag_id INTEGER,
        "index" INTEGER,
        text TEXT,
        created_at INTEGER
    )"#,
];

/// Library section every fixture movie lives in
pub const SECTION_ID: i64 = 1;

/// Temporary on-disk catalog
pub struct TestCatalog {
    pub dir: TempDir,
    pub path: PathBuf,
    pub pool: SqlitePool,
}

impl TestCatalog {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("com.plexapp.plugins.library.db");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        sqlx::query("INSERT INTO library_sections (id, name) VALUES (?, 'Movies')")
            .bind(SECTION_ID)
            .execute(&pool)
            .await
            .unwrap();

        Self { dir, path, pool }
    }

    pub fn store(&self) -> CatalogStore {
        CatalogStore::new(self.pool.clone())
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.dir.path().join("backups")
    }

    pub async fn add_movie(&self, title: &str, guid: &str, user_fields: &str) -> i64 {
        sqlx::query(
            r#"
            INSERT INTO metadata_items
                (library_section_id, metadata_type, guid, title, title_sort, tagline, content_rating, user_fields)
            VALUES (?, 1, ?, ?, ?, '', '', ?)
            "#,
        )
        .bind(SECTION_ID)
        .bind(guid)
        .bind(title)
        .bind(title)
        .bind(user_fields)
        .execute(&self.pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn add_tag(&self, name: &str, tag_type: i64) -> i64 {
        sqlx::query("INSERT INTO tags (tag, tag_type) VALUES (?, ?)")
            .bind(name)
            .bind(tag_type)
            .execute(&self.pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn tag(&self, metadata_item_id: i64, tag_id: i64) -> i64 {
        sqlx::query("INSERT INTO taggings (metadata_item_id, tag_id, \"index\") VALUES (?, ?, 0)")
            .bind(metadata_item_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    /// Collection record plus its collection tag; returns (record id, tag id)
    pub async fn add_collection(&self, title: &str, user_fields: &str) -> (i64, i64) {
        let tag_id = self.add_tag(title, 2).await;
        let id = sqlx::query(
            r#"
            INSERT INTO metadata_items
                (library_section_id, metadata_type, title, title_sort, summary, user_thumb_url, "index", user_fields)
            VALUES (?, 18, ?, '', '', '', ?, ?)
            "#,
        )
        .bind(SECTION_ID)
        .bind(title)
        .bind(tag_id)
        .bind(user_fields)
        .execute(&self.pool)
        .await
        .unwrap()
        .last_insert_rowid();
        (id, tag_id)
    }

    pub async fn text(&self, id: i64, column: &str) -> Option<String> {
        let sql = format!("SELECT {} AS value FROM metadata_items WHERE id = ?", column);
        sqlx::query(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
            .get("value")
    }

    pub async fn metadata_type(&self, id: i64) -> i64 {
        sqlx::query_scalar("SELECT metadata_type FROM metadata_items WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// (tag id, name) of every tag with `tag_type`
    pub async fn tags(&self, tag_type: i64) -> Vec<(i64, String)> {
        sqlx::query("SELECT id, tag FROM tags WHERE tag_type = ? ORDER BY id")
            .bind(tag_type)
            .fetch_all(&self.pool)
            .await
            .unwrap()
            .iter()
            .map(|row| (row.get("id"), row.get("tag")))
            .collect()
    }

    /// Tag ids a record is tagged with
    pub async fn tag_ids_of(&self, metadata_item_id: i64) -> Vec<i64> {
        sqlx::query_scalar("SELECT tag_id FROM taggings WHERE metadata_item_id = ? ORDER BY id")
            .bind(metadata_item_id)
            .fetch_all(&self.pool)
            .await
            .unwrap()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }
}

/// Config pointing at `catalog`, with `extra` TOML appended
pub fn test_config(catalog: &TestCatalog, extra: &str) -> UnifyConfig {
    let text = format!(
        r#"
        safety_lock = false

        [catalog]
        database_path = {:?}
        library = "Movies"

        [backup]
        directory = {:?}
        retention_count = 2

        [network]
        retry_attempts = 1
        retry_delay_secs = 0

        [tmdb]
        api_key = "test"
        primary_language = "en-US"
        secondary_language = "sv-SE"

        {}
        "#,
        catalog.path.display().to_string(),
        catalog.backup_dir().display().to_string(),
        extra
    );

    let config: UnifyConfig = toml::from_str(&text).unwrap();
    config.validate().unwrap();
    config
}
