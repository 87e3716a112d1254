//! Collection Resolution Engine
//!
//! Attaches a movie to the collection its provider reports. Title trimming
//! and viability are pure functions of provider data and configuration;
//! everything else reads the store and stages into the ledger.
//!
//! Members of a collection are its stored memberships plus insertions staged
//! earlier in the run, so two movies of a collection created during one run
//! see each other.

use crate::cache::{Language, RecordContext};
use crate::config::CollectionsConfig;
use crate::deletion::queue_for_deletion;
use crate::error::UnifyResult;
use crate::ledger::{Column, FieldValue, MutationLedger, Target};
use crate::locks::FieldCode;
use crate::providers::{CollectionMetadata, CollectionPart, MediaServer};
use crate::store::CatalogStore;
use crate::types::MediaRecord;
use std::path::Path;
use tracing::{debug, info, warn};

/// Strip the longest matching configured suffix from a collection title
///
/// Matching is case-insensitive and anchored at the end; surrounding
/// whitespace is trimmed. A suffix that would leave nothing is ignored.
pub fn trim_suffix(title: &str, suffixes: &[String]) -> String {
    let title = title.trim();

    let mut ordered: Vec<&str> = suffixes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

    for suffix in ordered {
        let Some(cut) = title.len().checked_sub(suffix.len()) else {
            continue;
        };
        if !title.is_char_boundary(cut) || title[cut..].to_lowercase() != suffix.to_lowercase() {
            continue;
        }
        let trimmed = title[..cut].trim_end();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    title.to_string()
}

/// Minimums a collection's members must clear
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViabilityThresholds {
    /// A member qualifies with strictly more votes than this
    pub min_votes: u64,
    /// ... and at least this average score
    pub min_score: f64,
    pub min_qualified_members: usize,
    pub min_total_score: f64,
}

impl From<&CollectionsConfig> for ViabilityThresholds {
    fn from(config: &CollectionsConfig) -> Self {
        Self {
            min_votes: config.min_votes,
            min_score: config.min_score,
            min_qualified_members: config.min_qualified_members,
            min_total_score: config.min_total_score,
        }
    }
}

/// Aggregate member quality of a collection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viability {
    pub qualified_members: usize,
    pub total_score: f64,
    pub viable: bool,
}

impl Viability {
    pub fn assess(parts: &[CollectionPart], thresholds: &ViabilityThresholds) -> Self {
        let qualified_members = parts
            .iter()
            .filter(|p| p.vote_count > thresholds.min_votes && p.vote_average >= thresholds.min_score)
            .count();
        let total_score: f64 = parts.iter().map(|p| p.vote_average).sum();

        Self {
            qualified_members,
            total_score,
            viable: qualified_members >= thresholds.min_qualified_members
                && total_score >= thresholds.min_total_score,
        }
    }
}

/// A resolved collection and its other members
#[derive(Debug, Clone)]
pub struct Collection {
    pub record: MediaRecord,
    pub tag_id: i64,
    /// Members other than the movie being resolved, in membership order
    pub member_movies: Vec<MediaRecord>,
    pub viability: Viability,
    pub trimmed_title: String,
    /// True when this resolution staged the movie's membership
    pub membership_staged: bool,
}

/// Resolves collections within one library section
pub struct CollectionResolver<'a> {
    store: &'a CatalogStore,
    media_server: Option<&'a dyn MediaServer>,
    config: &'a CollectionsConfig,
    section_id: i64,
}

impl<'a> CollectionResolver<'a> {
    pub fn new(
        store: &'a CatalogStore,
        media_server: Option<&'a dyn MediaServer>,
        config: &'a CollectionsConfig,
        section_id: i64,
    ) -> Self {
        Self {
            store,
            media_server,
            config,
            section_id,
        }
    }

    fn language(&self) -> Language {
        if self.config.prefer_secondary_language {
            Language::Secondary
        } else {
            Language::Primary
        }
    }

    /// Attach `movie` to its provider collection
    ///
    /// Returns `None` when the field is locked, the movie has no collection,
    /// the collection is not viable, or it could not be found or created.
    pub async fn resolve(
        &self,
        movie: &mut MediaRecord,
        ctx: &mut RecordContext<'_>,
        ledger: &mut MutationLedger,
    ) -> UnifyResult<Option<Collection>> {
        let policy = self.config.policy;
        if !policy.permits(&movie.locks, FieldCode::Collection) {
            debug!(movie = %movie.title, "Collection locked, skipping");
            return Ok(None);
        }

        let language = self.language();
        let Some(reference) = ctx.movie_collection(language).await? else {
            info!(movie = %movie.title, "Movie belongs to no collection");
            movie.locks.lock(FieldCode::Collection);
            return Ok(None);
        };

        let metadata = ctx.collection(&reference.id, language).await?.clone();
        let provider_title = if metadata.name.trim().is_empty() {
            reference.name.as_str()
        } else {
            metadata.name.as_str()
        };
        let trimmed_title = trim_suffix(provider_title, &self.config.suffixes);

        let viability = Viability::assess(&metadata.parts, &ViabilityThresholds::from(self.config));
        if !viability.viable {
            info!(
                movie = %movie.title,
                collection = %trimmed_title,
                qualified = viability.qualified_members,
                total_score = viability.total_score,
                "Collection not viable"
            );
            if self.config.auto_delete {
                for existing in self.store.collections_titled(self.section_id, &trimmed_title).await? {
                    queue_for_deletion(
                        ledger,
                        &existing,
                        self.config.lock_threshold,
                        self.config.lock_comparison,
                    );
                }
            }
            return Ok(None);
        }

        let record = match self.find(&trimmed_title, ledger).await? {
            Some(record) => record,
            None => match self.create(movie, &trimmed_title, ledger).await? {
                Some(record) => record,
                None => return Ok(None),
            },
        };

        let Some(tag_id) = record.index else {
            warn!(collection = %record, "Collection has no tag, skipping");
            return Ok(None);
        };

        let member_movies = self.members(tag_id, movie.id, ledger).await?;

        let membership_staged = if self.store.has_membership(movie.id, tag_id).await?
            || ledger.has_insertion(movie.id, tag_id)
        {
            false
        } else {
            info!(movie = %movie.title, collection = %trimmed_title, "Adding movie to collection");
            ledger.stage_insertion(movie.id, tag_id)
        };
        policy.complete(&mut movie.locks, FieldCode::Collection);

        self.enrich(&record, &metadata, &trimmed_title, ctx, ledger).await?;

        Ok(Some(Collection {
            record,
            tag_id,
            member_movies,
            viability,
            trimmed_title,
            membership_staged,
        }))
    }

    /// Existing collection by exact title, ignoring ones queued for deletion
    async fn find(&self, title: &str, ledger: &MutationLedger) -> UnifyResult<Option<MediaRecord>> {
        let found = self.store.collections_titled(self.section_id, title).await?;
        Ok(found.into_iter().find(|c| !ledger.is_deletion_staged(c.id)))
    }

    /// Ask the media server to create the collection, then wait for it to appear
    async fn create(
        &self,
        movie: &MediaRecord,
        title: &str,
        ledger: &MutationLedger,
    ) -> UnifyResult<Option<MediaRecord>> {
        let server = match self.media_server {
            Some(server) if self.config.allow_creation => server,
            _ => {
                debug!(movie = %movie.title, collection = %title, "Collection missing and creation disabled");
                return Ok(None);
            }
        };

        if let Err(e) = server.add_to_collection(movie, title).await {
            warn!(movie = %movie.title, collection = %title, error = %e, "Media server refused collection creation");
            return Ok(None);
        }

        for attempt in 1..=self.config.creation_poll_attempts {
            tokio::time::sleep(self.config.creation_poll_delay()).await;
            if let Some(record) = self.find(title, ledger).await? {
                info!(collection = %record, attempt, "Collection created");
                return Ok(Some(record));
            }
            debug!(collection = %title, attempt, "Waiting for collection to appear");
        }

        warn!(
            movie = %movie.title,
            collection = %title,
            attempts = self.config.creation_poll_attempts,
            "Created collection never appeared in the catalog"
        );
        Ok(None)
    }

    /// Stored plus pending members, excluding `movie_id`
    async fn members(&self, tag_id: i64, movie_id: i64, ledger: &MutationLedger) -> UnifyResult<Vec<MediaRecord>> {
        let mut ids = self.store.tag_members(tag_id).await?;
        for pending in ledger.pending_members(tag_id) {
            if !ids.contains(&pending) {
                ids.push(pending);
            }
        }

        let mut members = Vec::with_capacity(ids.len());
        for id in ids.into_iter().filter(|id| *id != movie_id) {
            if let Some(record) = self.store.record(id).await? {
                members.push(record);
            }
        }
        Ok(members)
    }

    /// Summary, sort title and poster of the collection record itself
    async fn enrich(
        &self,
        collection: &MediaRecord,
        metadata: &CollectionMetadata,
        trimmed_title: &str,
        ctx: &mut RecordContext<'_>,
        ledger: &mut MutationLedger,
    ) -> UnifyResult<()> {
        let policy = self.config.policy;
        let target = Target::MetadataItem(collection.id);
        ledger.observe_record(collection);

        if self.config.update_summary
            && policy.permits(&collection.locks, FieldCode::Summary)
            && (policy.force || collection.summary.is_empty())
            && !metadata.overview.is_empty()
        {
            ledger.stage(target, Column::Summary, metadata.overview.as_str());
        }

        if self.config.update_sort_title && policy.permits(&collection.locks, FieldCode::SortTitle) {
            ledger.stage(target, Column::TitleSort, trimmed_title);
        }

        if self.config.update_poster && policy.permits(&collection.locks, FieldCode::Poster) {
            if let (Some(poster_path), Some(directory)) = (&metadata.poster_path, &self.config.poster_directory) {
                let file = poster_file(directory, collection.id, poster_path);
                let url = FieldValue::Text(format!("file://{}", file.display()));

                let current = FieldValue::Text(collection.user_thumb_url.clone());
                let already_staged = ledger.staged_value(target, Column::UserThumbUrl) == Some(&url);
                if current != url && !already_staged {
                    let bytes = ctx.image(poster_path).await?;
                    debug!(collection = %collection, file = %file.display(), bytes = bytes.len(), "Poster downloaded");
                    ledger.stage_artifact(file, bytes);
                    ledger.stage(target, Column::UserThumbUrl, url);
                }
            }
        }

        Ok(())
    }
}

fn poster_file(directory: &Path, collection_id: i64, poster_path: &str) -> std::path::PathBuf {
    let extension = Path::new(poster_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg");
    directory.join(format!("collection-{}.{}", collection_id, extension))
}
