//! In-memory stand-ins for the external collaborators

use async_trait::async_trait;
use plexunify::error::ProviderError;
use plexunify::providers::{
    CollectionMetadata, CollectionPart, CollectionRef, MediaServer, MetadataProvider, MovieMetadata, RatingSource,
};
use plexunify::types::MediaRecord;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Movie metadata with the fields the rules read
pub fn movie(id: &str, title: &str, tagline: &str) -> MovieMetadata {
    MovieMetadata {
        id: id.to_string(),
        imdb_id: Some(format!("tt{:0>7}", id)),
        title: title.to_string(),
        original_title: title.to_string(),
        tagline: tagline.to_string(),
        ..MovieMetadata::default()
    }
}

/// Provider answering from fixed tables
#[derive(Default)]
pub struct FakeProvider {
    /// (native id, language) -> metadata
    movies: HashMap<(String, String), MovieMetadata>,
    collections: HashMap<String, CollectionMetadata>,
    /// cross id -> native id
    cross_ids: HashMap<String, String>,
    /// native id -> error returned by fetch_movie
    failures: HashMap<String, ProviderError>,
    /// Fetching this native id drops the genre tag table, as if the catalog
    /// were damaged mid-run
    breaks_catalog: Option<(String, SqlitePool)>,
    pub movie_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_movie(mut self, language: &str, metadata: MovieMetadata) -> Self {
        self.movies
            .insert((metadata.id.clone(), language.to_string()), metadata);
        self
    }

    /// Same metadata in both test languages
    pub fn with_movie_everywhere(self, metadata: MovieMetadata) -> Self {
        self.with_movie("en-US", metadata.clone()).with_movie("sv-SE", metadata)
    }

    pub fn with_collection(mut self, metadata: CollectionMetadata) -> Self {
        self.collections.insert(metadata.id.clone(), metadata);
        self
    }

    pub fn with_cross_id(mut self, cross_id: &str, native_id: &str) -> Self {
        self.cross_ids.insert(cross_id.to_string(), native_id.to_string());
        self
    }

    pub fn failing(mut self, native_id: &str, error: ProviderError) -> Self {
        self.failures.insert(native_id.to_string(), error);
        self
    }

    pub fn breaking_catalog_on(mut self, native_id: &str, pool: SqlitePool) -> Self {
        self.breaks_catalog = Some((native_id.to_string(), pool));
        self
    }

    pub fn movie_calls(&self) -> usize {
        self.movie_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn find_native_id(&self, cross_id: &str) -> Result<Option<String>, ProviderError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cross_ids.get(cross_id).cloned())
    }

    async fn fetch_movie(&self, native_id: &str, language: &str) -> Result<MovieMetadata, ProviderError> {
        self.movie_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.get(native_id) {
            return Err(error.clone());
        }
        if let Some((id, pool)) = &self.breaks_catalog {
            if id == native_id {
                sqlx::query("DROP TABLE IF EXISTS tags")
                    .execute(pool)
                    .await
                    .map_err(|e| ProviderError::Permanent(e.to_string()))?;
            }
        }
        self.movies
            .get(&(native_id.to_string(), language.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::Permanent(format!("movie {} not found", native_id)))
    }

    async fn fetch_collection(
        &self,
        collection_id: &str,
        _language: &str,
    ) -> Result<CollectionMetadata, ProviderError> {
        self.collections
            .get(collection_id)
            .cloned()
            .ok_or_else(|| ProviderError::Permanent(format!("collection {} not found", collection_id)))
    }

    async fn fetch_image(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(path.as_bytes().to_vec())
    }
}

/// Collection metadata whose parts all score `score` with `votes` votes
pub fn collection(id: &str, name: &str, parts: &[(f64, u64)]) -> CollectionMetadata {
    CollectionMetadata {
        id: id.to_string(),
        name: name.to_string(),
        overview: format!("All {} films", name),
        poster_path: Some(format!("/{}.jpg", id)),
        parts: parts
            .iter()
            .enumerate()
            .map(|(i, (score, votes))| CollectionPart {
                id: i.to_string(),
                title: format!("{} {}", name, i + 1),
                vote_average: *score,
                vote_count: *votes,
            })
            .collect(),
    }
}

/// Attach `collection` to movie metadata
pub fn in_collection(mut metadata: MovieMetadata, collection: &CollectionMetadata) -> MovieMetadata {
    metadata.collection = Some(CollectionRef {
        id: collection.id.clone(),
        name: collection.name.clone(),
    });
    metadata
}

/// Rating source answering from a fixed table
#[derive(Default)]
pub struct FakeRatings {
    ratings: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl FakeRatings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rating(mut self, imdb_id: &str, label: &str) -> Self {
        self.ratings.insert(imdb_id.to_string(), label.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RatingSource for FakeRatings {
    async fn fetch_content_rating(
        &self,
        imdb_id: &str,
        _country_code: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ratings.get(imdb_id).cloned())
    }
}

/// Media server that creates collections directly in the fixture catalog,
/// the way Plex does when a movie is added to an unknown collection
pub struct FakeMediaServer {
    pool: SqlitePool,
    pub calls: AtomicUsize,
}

impl FakeMediaServer {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaServer for FakeMediaServer {
    async fn add_to_collection(&self, record: &MediaRecord, collection_title: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = |e: sqlx::Error| ProviderError::Permanent(e.to_string());

        let tag_id = sqlx::query("INSERT INTO tags (tag, tag_type) VALUES (?, 2)")
            .bind(collection_title)
            .execute(&self.pool)
            .await
            .map_err(fail)?
            .last_insert_rowid();

        sqlx::query(
            r#"
            INSERT INTO metadata_items
                (library_section_id, metadata_type, title, title_sort, summary, user_thumb_url, "index", user_fields)
            VALUES (?, 18, ?, '', '', '', ?, '')
            "#,
        )
        .bind(record.library_section_id)
        .bind(collection_title)
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(fail)?;

        sqlx::query("INSERT INTO taggings (metadata_item_id, tag_id, \"index\") VALUES (?, ?, 0)")
            .bind(record.id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(fail)?;

        Ok(())
    }
}
