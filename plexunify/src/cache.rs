//! Provider Metadata Cache
//!
//! One [`RecordContext`] is created per movie and handed to every rule. It
//! fetches each piece of provider data at most once and is dropped when the
//! movie is done, so nothing leaks between records.

use crate::error::ProviderError;
use crate::providers::{CollectionMetadata, CollectionRef, MetadataProvider, MovieMetadata};
use crate::types::MediaRecord;
use std::collections::HashMap;
use tracing::debug;

/// Provider rank, resolved to a language code by the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Primary,
    Secondary,
}

impl Language {
    pub fn other(self) -> Self {
        match self {
            Language::Primary => Language::Secondary,
            Language::Secondary => Language::Primary,
        }
    }
}

/// Language codes of the two ranked providers
#[derive(Debug, Clone)]
pub struct Languages {
    pub primary: String,
    pub secondary: String,
}

/// Memoized provider data for one movie
pub struct RecordContext<'a> {
    provider: &'a dyn MetadataProvider,
    languages: &'a Languages,
    title: String,
    native_id: Option<String>,
    native_lookup_done: bool,
    imdb_id: Option<String>,
    primary: Option<MovieMetadata>,
    secondary: Option<MovieMetadata>,
    collections: HashMap<(String, Language), CollectionMetadata>,
}

impl<'a> RecordContext<'a> {
    pub fn new(provider: &'a dyn MetadataProvider, languages: &'a Languages, record: &MediaRecord) -> Self {
        Self {
            provider,
            languages,
            title: record.title.clone(),
            native_id: record.external.tmdb.clone(),
            native_lookup_done: false,
            imdb_id: record.external.imdb.clone(),
            primary: None,
            secondary: None,
            collections: HashMap::new(),
        }
    }

    pub fn language_code(&self, language: Language) -> &str {
        match language {
            Language::Primary => &self.languages.primary,
            Language::Secondary => &self.languages.secondary,
        }
    }

    /// Provider native id, resolved from the cross-reference id at most once
    pub async fn native_id(&mut self) -> Result<String, ProviderError> {
        if let Some(id) = &self.native_id {
            return Ok(id.clone());
        }
        if self.native_lookup_done {
            return Err(ProviderError::Permanent(format!(
                "no {} id for '{}'",
                self.provider.name(),
                self.title
            )));
        }
        self.native_lookup_done = true;

        let cross_id = self.imdb_id.clone().ok_or_else(|| {
            ProviderError::Permanent(format!("'{}' has neither a TMDb nor an IMDb id", self.title))
        })?;

        let found = self.provider.find_native_id(&cross_id).await?;
        let id = found.ok_or_else(|| {
            ProviderError::Permanent(format!(
                "{} has no match for {} ('{}')",
                self.provider.name(),
                cross_id,
                self.title
            ))
        })?;

        debug!(movie = %self.title, cross_id = %cross_id, native_id = %id, "Resolved native id");
        self.native_id = Some(id.clone());
        Ok(id)
    }

    /// Movie metadata in the given provider language
    pub async fn movie(&mut self, language: Language) -> Result<&MovieMetadata, ProviderError> {
        let cached = match language {
            Language::Primary => self.primary.is_some(),
            Language::Secondary => self.secondary.is_some(),
        };

        if !cached {
            let native_id = self.native_id().await?;
            let code = self.language_code(language).to_string();
            let metadata = self.provider.fetch_movie(&native_id, &code).await?;
            debug!(movie = %self.title, language = %code, "Fetched movie metadata");

            match language {
                Language::Primary => {
                    // Cross-link the IMDb id for the rating source
                    if self.imdb_id.is_none() {
                        self.imdb_id = metadata.imdb_id.clone();
                    }
                    self.primary = Some(metadata);
                }
                Language::Secondary => self.secondary = Some(metadata),
            }
        }

        let slot = match language {
            Language::Primary => &self.primary,
            Language::Secondary => &self.secondary,
        };
        slot.as_ref()
            .ok_or_else(|| ProviderError::Permanent(format!("movie metadata missing for '{}'", self.title)))
    }

    pub async fn primary(&mut self) -> Result<&MovieMetadata, ProviderError> {
        self.movie(Language::Primary).await
    }

    pub async fn secondary(&mut self) -> Result<&MovieMetadata, ProviderError> {
        self.movie(Language::Secondary).await
    }

    /// IMDb id, from the guid or cross-linked by the primary fetch
    pub async fn imdb_id(&mut self) -> Result<String, ProviderError> {
        if self.imdb_id.is_none() {
            self.primary().await?;
        }
        self.imdb_id
            .clone()
            .ok_or_else(|| ProviderError::Permanent(format!("no IMDb id for '{}'", self.title)))
    }

    /// Collection the movie belongs to, per `language`'s metadata
    pub async fn movie_collection(&mut self, language: Language) -> Result<Option<CollectionRef>, ProviderError> {
        Ok(self.movie(language).await?.collection.clone())
    }

    /// Collection metadata, fetched once per (collection, language)
    pub async fn collection(
        &mut self,
        collection_id: &str,
        language: Language,
    ) -> Result<&CollectionMetadata, ProviderError> {
        let key = (collection_id.to_string(), language);

        if !self.collections.contains_key(&key) {
            let code = self.language_code(language).to_string();
            let metadata = self.provider.fetch_collection(collection_id, &code).await?;
            debug!(movie = %self.title, collection = %metadata.name, language = %code, "Fetched collection metadata");
            self.collections.insert(key.clone(), metadata);
        }

        self.collections.get(&key).ok_or_else(|| {
            ProviderError::Permanent(format!("collection {} metadata missing", collection_id))
        })
    }

    /// Image bytes (not memoized)
    pub async fn image(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        self.provider.fetch_image(path).await
    }
}
