//! External collaborators
//!
//! The engine only talks to these traits. Concrete clients:
//! - [`tmdb::TmdbClient`]: primary/secondary movie and collection metadata
//! - [`imdb::ImdbRatings`]: content rating by country
//! - [`media_server::PlexServer`]: collection creation through the server API

pub mod http;
pub mod imdb;
pub mod media_server;
pub mod retry;
pub mod tmdb;

pub use imdb::ImdbRatings;
pub use media_server::PlexServer;
pub use retry::{with_retry, RetryPolicy};
pub use tmdb::TmdbClient;

use crate::error::ProviderError;
use crate::types::MediaRecord;
use async_trait::async_trait;

/// Collection a movie belongs to, as reported with the movie
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRef {
    pub id: String,
    pub name: String,
}

/// Movie metadata in one language
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MovieMetadata {
    pub id: String,
    /// Cross-reference id, when the provider knows it
    pub imdb_id: Option<String>,
    pub title: String,
    pub original_title: String,
    pub tagline: String,
    pub overview: String,
    pub vote_average: f64,
    pub vote_count: u64,
    pub collection: Option<CollectionRef>,
}

/// One movie listed as a collection member by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPart {
    pub id: String,
    pub title: String,
    pub vote_average: f64,
    pub vote_count: u64,
}

/// Collection metadata in one language
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionMetadata {
    pub id: String,
    pub name: String,
    pub overview: String,
    pub poster_path: Option<String>,
    pub parts: Vec<CollectionPart>,
}

/// Ranked metadata source (primary and secondary differ only by language)
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider name for log messages
    fn name(&self) -> &'static str;

    /// Resolve a cross-reference id to the provider's native id
    ///
    /// `Ok(None)` means the provider has no match.
    async fn find_native_id(&self, cross_id: &str) -> Result<Option<String>, ProviderError>;

    async fn fetch_movie(&self, native_id: &str, language: &str) -> Result<MovieMetadata, ProviderError>;

    async fn fetch_collection(
        &self,
        collection_id: &str,
        language: &str,
    ) -> Result<CollectionMetadata, ProviderError>;

    /// Download an image referenced by a metadata path
    async fn fetch_image(&self, path: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Content rating lookup
#[async_trait]
pub trait RatingSource: Send + Sync {
    /// Rating label for `country_code`, or `None` when the source has none
    async fn fetch_content_rating(
        &self,
        imdb_id: &str,
        country_code: &str,
    ) -> Result<Option<String>, ProviderError>;
}

/// Media server control API
///
/// Only used to create collections that do not exist yet; the server owns
/// collection row creation.
#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn add_to_collection(
        &self,
        record: &MediaRecord,
        collection_title: &str,
    ) -> Result<(), ProviderError>;
}
