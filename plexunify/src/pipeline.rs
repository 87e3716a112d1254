//! Run pipeline
//!
//! One sequential pass over the movies of a library section:
//! - every enabled rule runs against a fresh [`RecordContext`]
//! - the movie is attached to its collection
//! - lock changes are staged last, after rules that may have added locks
//!
//! A permanent provider failure skips the rest of that movie. Any other
//! failure stops the pass. Either way the ledger is flushed once, so changes
//! staged for earlier movies are committed before a catalog or IO error is
//! returned.

use crate::cache::{Languages, RecordContext};
use crate::collections::CollectionResolver;
use crate::commit::{self, CommitOptions, CommitOutcome, Confirm};
use crate::config::UnifyConfig;
use crate::error::{UnifyError, UnifyResult};
use crate::ledger::{Column, MutationLedger, Target};
use crate::providers::{MediaServer, MetadataProvider, RatingSource};
use crate::rules::{self, RuleOutcome};
use crate::store::CatalogStore;
use crate::types::MediaRecord;
use tracing::{error, info, warn};

/// Summary of one run
#[derive(Debug)]
pub struct RunReport {
    /// Movies read from the catalog
    pub movies: usize,
    /// Movies whose rules all completed
    pub processed: usize,
    /// Titles skipped after a permanent provider failure
    pub skipped: Vec<String>,
    /// Movies attached to a collection
    pub collections_resolved: usize,
    /// Rules that staged a value, over the processed movies
    pub rules_applied: usize,
    pub commit: CommitOutcome,
    /// Provider failure that ended the pass early
    pub stopped_by: Option<UnifyError>,
}

impl RunReport {
    /// True when the pass ran over every movie
    pub fn completed(&self) -> bool {
        self.stopped_by.is_none()
    }
}

/// Drives one reconciliation run
pub struct Unifier<'a> {
    config: &'a UnifyConfig,
    store: CatalogStore,
    provider: &'a dyn MetadataProvider,
    ratings: &'a dyn RatingSource,
    media_server: Option<&'a dyn MediaServer>,
    languages: Languages,
}

impl<'a> Unifier<'a> {
    pub fn new(
        config: &'a UnifyConfig,
        store: CatalogStore,
        provider: &'a dyn MetadataProvider,
        ratings: &'a dyn RatingSource,
        media_server: Option<&'a dyn MediaServer>,
    ) -> Self {
        let languages = Languages {
            primary: config.tmdb.primary_language.clone(),
            secondary: config.tmdb.secondary_language.clone(),
        };

        Self {
            config,
            store,
            provider,
            ratings,
            media_server,
            languages,
        }
    }

    /// Process the configured library and flush the ledger
    pub async fn run(&self, options: &CommitOptions, confirm: &mut dyn Confirm) -> UnifyResult<RunReport> {
        let section_id = self.store.resolve_section(&self.config.catalog.library).await?;
        let movies = self
            .store
            .movies(section_id, self.config.catalog.modify_limit)
            .await?;
        info!(
            library = %self.config.catalog.library,
            movies = movies.len(),
            "Starting reconciliation"
        );

        let resolver = CollectionResolver::new(
            &self.store,
            self.media_server,
            &self.config.collections,
            section_id,
        );

        let mut ledger = MutationLedger::new();
        let mut report = RunReport {
            movies: movies.len(),
            processed: 0,
            skipped: Vec::new(),
            collections_resolved: 0,
            rules_applied: 0,
            commit: CommitOutcome::Empty,
            stopped_by: None,
        };
        let mut aborted = None;

        for mut movie in movies {
            ledger.observe_record(&movie);
            let result = self.process_movie(&mut movie, &resolver, &mut ledger).await;

            // Locks added by completed rules are kept even when a later rule failed
            if movie.locks.is_modified() {
                ledger.stage(
                    Target::MetadataItem(movie.id),
                    Column::UserFields,
                    movie.locks.serialize(),
                );
            }

            match result {
                Ok(outcome) => {
                    report.processed += 1;
                    report.rules_applied += outcome.rules_applied;
                    if outcome.collection_resolved {
                        report.collections_resolved += 1;
                    }
                }
                Err(e) if e.is_permanent_provider_failure() => {
                    warn!(movie = %movie.title, error = %e, "Skipping movie");
                    report.skipped.push(movie.title.clone());
                }
                Err(e) if e.stops_run() => {
                    error!(movie = %movie.title, error = %e, "Giving up, committing what was staged so far");
                    report.stopped_by = Some(e);
                    break;
                }
                Err(e) => {
                    error!(movie = %movie.title, error = %e, "Aborting, committing what was staged so far");
                    aborted = Some(e);
                    break;
                }
            }
        }

        let flushed = commit::flush(&mut ledger, &self.store, options, confirm).await;
        if let Some(e) = aborted {
            if let Err(flush_error) = flushed {
                error!(error = %flush_error, "Commit after abort failed");
            }
            return Err(e);
        }
        report.commit = flushed?;

        info!(
            processed = report.processed,
            rules_applied = report.rules_applied,
            skipped = report.skipped.len(),
            collections = report.collections_resolved,
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Run every enabled rule for one movie
    async fn process_movie(
        &self,
        movie: &mut MediaRecord,
        resolver: &CollectionResolver<'_>,
        ledger: &mut MutationLedger,
    ) -> UnifyResult<MovieOutcome> {
        let config = self.config;
        let mut ctx = RecordContext::new(self.provider, &self.languages, movie);
        let mut outcomes = Vec::with_capacity(4);

        if config.sort_title.policy.enabled {
            outcomes.push(rules::sort_title(movie, &mut ctx, ledger, &config.sort_title).await?);
        }
        if config.content_rating.policy.enabled {
            outcomes.push(rules::content_rating(movie, &mut ctx, self.ratings, ledger, &config.content_rating).await?);
        }
        if config.tagline.policy.enabled {
            outcomes.push(rules::tagline(movie, &mut ctx, ledger, &config.tagline).await?);
        }
        if config.genres.policy.enabled {
            outcomes.push(rules::genres(movie, &self.store, ledger, &config.genres).await?);
        }

        let mut outcome = MovieOutcome {
            rules_applied: outcomes.iter().filter(|o| **o == RuleOutcome::Applied).count(),
            collection_resolved: false,
        };

        if config.collections.policy.enabled {
            if let Some(collection) = resolver.resolve(movie, &mut ctx, ledger).await? {
                info!(
                    movie = %movie.title,
                    collection = %collection.trimmed_title,
                    other_members = collection.member_movies.len(),
                    "Collection resolved"
                );
                outcome.collection_resolved = true;
            }
        }

        Ok(outcome)
    }
}

/// What the rules did to one movie
#[derive(Debug, Clone, Copy)]
struct MovieOutcome {
    rules_applied: usize,
    collection_resolved: bool,
}
