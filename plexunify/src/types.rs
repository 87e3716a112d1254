//! Catalog record types
//!
//! Records are read once per run. Only the lock set is mutated in memory;
//! every other change is staged in the ledger.

use crate::locks::FieldLocks;
use std::fmt;

/// `metadata_items.metadata_type` for movies
pub const METADATA_TYPE_MOVIE: i64 = 1;
/// `metadata_items.metadata_type` for collections
pub const METADATA_TYPE_COLLECTION: i64 = 18;
/// Sentinel type for reclassified (deleted) collections
pub const METADATA_TYPE_DELETED: i64 = -1;

/// `tags.tag_type` for genres
pub const TAG_TYPE_GENRE: i64 = 1;

/// Entity kind of a catalog record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Collection,
}

impl MediaKind {
    pub fn metadata_type(self) -> i64 {
        match self {
            MediaKind::Movie => METADATA_TYPE_MOVIE,
            MediaKind::Collection => METADATA_TYPE_COLLECTION,
        }
    }
}

/// External identifiers parsed from a record's guid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalIds {
    /// Primary provider native id (TMDb)
    pub tmdb: Option<String>,
    /// Cross-reference id (IMDb `tt...`)
    pub imdb: Option<String>,
}

impl ExternalIds {
    /// Parse an agent guid such as `com.plexapp.agents.imdb://tt0078748?lang=en`
    ///
    /// Returns `None` for guids from other agents.
    pub fn from_guid(guid: &str) -> Option<Self> {
        let (scheme, rest) = guid.split_once("://")?;
        let id = rest.split(&['?', '/'][..]).next().unwrap_or_default().trim();
        if id.is_empty() {
            return None;
        }

        if scheme.ends_with(".themoviedb") {
            Some(Self {
                tmdb: Some(id.to_string()),
                imdb: None,
            })
        } else if scheme.ends_with(".imdb") {
            Some(Self {
                tmdb: None,
                imdb: Some(id.to_string()),
            })
        } else {
            None
        }
    }
}

/// A movie or collection row from `metadata_items`
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub id: i64,
    pub kind: MediaKind,
    pub library_section_id: i64,
    pub guid: String,
    pub title: String,
    pub title_sort: String,
    pub original_title: String,
    pub tagline: String,
    pub content_rating: String,
    pub summary: String,
    pub user_thumb_url: String,
    /// For collections, the id of the collection tag
    pub index: Option<i64>,
    pub external: ExternalIds,
    pub locks: FieldLocks,
}

impl fmt::Display for MediaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' (id {})", self.title, self.id)
    }
}
