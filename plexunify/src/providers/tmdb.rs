//! TMDb API client
//!
//! Primary and secondary metadata are the same endpoints queried with two
//! language codes.
//!
//! # API Reference
//! - Find by external id: `GET /3/find/{imdb_id}?external_source=imdb_id`
//! - Movie: `GET /3/movie/{id}?language=..`
//! - Collection: `GET /3/collection/{id}?language=..`
//! - Images: `https://image.tmdb.org/t/p/original{path}`

use crate::error::ProviderError;
use crate::providers::http::HttpFetcher;
use crate::providers::{CollectionMetadata, CollectionPart, CollectionRef, MetadataProvider, MovieMetadata};
use async_trait::async_trait;
use serde::Deserialize;
use std::num::NonZeroU32;
use tracing::debug;

const TMDB_API_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_URL: &str = "https://image.tmdb.org/t/p/original";

/// Requests per second; TMDb allows bursts well above this
const REQUESTS_PER_SECOND: u32 = 4;

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindMovie>,
}

#[derive(Debug, Deserialize)]
struct FindMovie {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: u64,
    imdb_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_title: String,
    tagline: Option<String>,
    overview: Option<String>,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    vote_count: u64,
    belongs_to_collection: Option<TmdbCollectionRef>,
}

#[derive(Debug, Deserialize)]
struct TmdbCollectionRef {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbCollection {
    id: u64,
    name: String,
    overview: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    parts: Vec<TmdbPart>,
}

#[derive(Debug, Deserialize)]
struct TmdbPart {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    vote_count: u64,
}

impl From<TmdbMovie> for MovieMetadata {
    fn from(movie: TmdbMovie) -> Self {
        Self {
            id: movie.id.to_string(),
            imdb_id: movie.imdb_id.filter(|id| !id.is_empty()),
            title: movie.title,
            original_title: movie.original_title,
            tagline: movie.tagline.unwrap_or_default(),
            overview: movie.overview.unwrap_or_default(),
            vote_average: movie.vote_average,
            vote_count: movie.vote_count,
            collection: movie.belongs_to_collection.map(|c| CollectionRef {
                id: c.id.to_string(),
                name: c.name,
            }),
        }
    }
}

impl From<TmdbCollection> for CollectionMetadata {
    fn from(collection: TmdbCollection) -> Self {
        Self {
            id: collection.id.to_string(),
            name: collection.name,
            overview: collection.overview.unwrap_or_default(),
            poster_path: collection.poster_path.filter(|p| !p.is_empty()),
            parts: collection
                .parts
                .into_iter()
                .map(|p| CollectionPart {
                    id: p.id.to_string(),
                    title: p.title,
                    vote_average: p.vote_average,
                    vote_count: p.vote_count,
                })
                .collect(),
        }
    }
}

/// TMDb client
pub struct TmdbClient {
    fetcher: HttpFetcher,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, fetcher: HttpFetcher) -> Self {
        let per_second = NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN);
        let limiter = governor::RateLimiter::direct(governor::Quota::per_second(per_second));

        Self {
            fetcher: fetcher.with_rate_limiter(limiter),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &'static str {
        "TMDb"
    }

    async fn find_native_id(&self, cross_id: &str) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/find/{}", TMDB_API_URL, cross_id);
        let query = [
            ("api_key", self.api_key.as_str()),
            ("external_source", "imdb_id"),
        ];

        let found: FindResponse = self.fetcher.get_json("tmdb id", &url, &query).await?;
        let native_id = found.movie_results.first().map(|m| m.id.to_string());

        debug!(cross_id, native_id = ?native_id, "TMDb find complete");
        Ok(native_id)
    }

    async fn fetch_movie(&self, native_id: &str, language: &str) -> Result<MovieMetadata, ProviderError> {
        let url = format!("{}/movie/{}", TMDB_API_URL, native_id);
        let query = [("api_key", self.api_key.as_str()), ("language", language)];
        let label = format!("{} movie metadata from tmdb", language);

        let movie: TmdbMovie = self.fetcher.get_json(&label, &url, &query).await?;
        Ok(movie.into())
    }

    async fn fetch_collection(
        &self,
        collection_id: &str,
        language: &str,
    ) -> Result<CollectionMetadata, ProviderError> {
        let url = format!("{}/collection/{}", TMDB_API_URL, collection_id);
        let query = [("api_key", self.api_key.as_str()), ("language", language)];
        let label = format!("{} collection metadata from tmdb", language);

        let collection: TmdbCollection = self.fetcher.get_json(&label, &url, &query).await?;
        Ok(collection.into())
    }

    async fn fetch_image(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        let url = format!("{}{}", TMDB_IMAGE_URL, path);
        self.fetcher.get_bytes("image from tmdb", &url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_json_maps_nulls_to_empty() {
        let json = r#"{
            "id": 348,
            "imdb_id": "tt0078748",
            "title": "Alien",
            "original_title": "Alien",
            "tagline": null,
            "overview": "In space no one can hear you scream.",
            "vote_average": 8.1,
            "vote_count": 13000,
            "belongs_to_collection": {"id": 8091, "name": "Alien Collection", "poster_path": "/x.jpg"}
        }"#;

        let movie: MovieMetadata = serde_json::from_str::<TmdbMovie>(json).unwrap().into();
        assert_eq!(movie.id, "348");
        assert_eq!(movie.imdb_id.as_deref(), Some("tt0078748"));
        assert_eq!(movie.tagline, "");
        assert_eq!(
            movie.collection,
            Some(CollectionRef {
                id: "8091".into(),
                name: "Alien Collection".into()
            })
        );
    }

    #[test]
    fn test_collection_json_parts() {
        let json = r#"{
            "id": 1575,
            "name": "Rocky Collection",
            "overview": "",
            "poster_path": "",
            "parts": [
                {"id": 1366, "title": "Rocky", "vote_average": 7.8, "vote_count": 7000},
                {"id": 1367, "title": "Rocky II"}
            ]
        }"#;

        let collection: CollectionMetadata = serde_json::from_str::<TmdbCollection>(json).unwrap().into();
        assert_eq!(collection.poster_path, None);
        assert_eq!(collection.parts.len(), 2);
        assert_eq!(collection.parts[1].vote_count, 0);
    }

    #[test]
    fn test_find_without_results() {
        let found: FindResponse = serde_json::from_str(r#"{"movie_results": []}"#).unwrap();
        assert!(found.movie_results.is_empty());
    }
}
