//! Per-movie metadata rules
//!
//! Each rule checks its [`RulePolicy`](crate::locks::RulePolicy), computes a
//! value from provider data, stages it, and locks its field when configured.
//! Staging a value equal to the stored one is harmless: the ledger drops it.

use crate::cache::{Language, RecordContext};
use crate::config::{ContentRatingConfig, GenresConfig, SortTitleConfig, TaglineConfig};
use crate::error::UnifyResult;
use crate::ledger::{Column, MutationLedger, Target};
use crate::locks::FieldCode;
use crate::providers::RatingSource;
use crate::store::CatalogStore;
use crate::tags::{reconcile, TagCatalog};
use crate::types::{MediaRecord, TAG_TYPE_GENRE};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What a rule did to one movie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Policy, lock or current value kept the rule from running
    Skipped,
    /// A value was computed and staged
    Applied,
}

/// `"primary delim secondary"`, or the title alone when both languages agree
pub fn compose_sort_title(primary: &str, secondary: &str, delimiter: &str, invert: bool) -> String {
    if primary == secondary {
        return primary.to_string();
    }
    let (first, second) = if invert { (secondary, primary) } else { (primary, secondary) };
    format!("{} {} {}", first, delimiter, second)
}

/// Stored label for a provider label; unmatched or missing labels map to `unknown`
///
/// Provider labels compare case-insensitively; with several stored labels
/// mapping from the same provider label, the first in key order wins.
pub fn map_rating(provider_label: Option<&str>, mapping: &BTreeMap<String, String>, unknown: &str) -> String {
    provider_label
        .and_then(|label| {
            let label = label.trim().to_lowercase();
            mapping
                .iter()
                .find(|(_, from)| from.trim().to_lowercase() == label)
                .map(|(stored, _)| stored.clone())
        })
        .unwrap_or_else(|| unknown.to_string())
}

pub async fn sort_title(
    movie: &mut MediaRecord,
    ctx: &mut RecordContext<'_>,
    ledger: &mut MutationLedger,
    config: &SortTitleConfig,
) -> UnifyResult<RuleOutcome> {
    let policy = config.policy;
    if !policy.permits(&movie.locks, FieldCode::SortTitle) {
        debug!(movie = %movie.title, "Sort title locked, skipping");
        return Ok(RuleOutcome::Skipped);
    }

    let primary = ctx.primary().await?.title.clone();
    let secondary = ctx.secondary().await?.title.clone();
    let title_sort = compose_sort_title(&primary, &secondary, &config.delimiter, config.invert_title_positions);

    if title_sort != movie.title_sort {
        info!(movie = %movie.title, title_sort = %title_sort, "Sort title");
    }
    ledger.stage(Target::MetadataItem(movie.id), Column::TitleSort, title_sort);
    policy.complete(&mut movie.locks, FieldCode::SortTitle);
    Ok(RuleOutcome::Applied)
}

pub async fn content_rating(
    movie: &mut MediaRecord,
    ctx: &mut RecordContext<'_>,
    ratings: &dyn RatingSource,
    ledger: &mut MutationLedger,
    config: &ContentRatingConfig,
) -> UnifyResult<RuleOutcome> {
    let policy = config.policy;
    if !policy.permits(&movie.locks, FieldCode::ContentRating) {
        debug!(movie = %movie.title, "Content rating locked, skipping");
        return Ok(RuleOutcome::Skipped);
    }
    if !policy.force
        && (config.mapping.contains_key(&movie.content_rating) || movie.content_rating == config.unknown_rating)
    {
        debug!(movie = %movie.title, rating = %movie.content_rating, "Content rating already mapped");
        return Ok(RuleOutcome::Skipped);
    }

    let imdb_id = ctx.imdb_id().await?;
    let certificate = ratings.fetch_content_rating(&imdb_id, &config.country_code).await?;
    if certificate.is_none() {
        info!(
            movie = %movie.title,
            country = %config.country_code,
            "No content rating for this country"
        );
    }

    let rating = map_rating(certificate.as_deref(), &config.mapping, &config.unknown_rating);
    info!(movie = %movie.title, rating = %rating, "Content rating");
    ledger.stage(Target::MetadataItem(movie.id), Column::ContentRating, rating);
    policy.complete(&mut movie.locks, FieldCode::ContentRating);
    Ok(RuleOutcome::Applied)
}

pub async fn tagline(
    movie: &mut MediaRecord,
    ctx: &mut RecordContext<'_>,
    ledger: &mut MutationLedger,
    config: &TaglineConfig,
) -> UnifyResult<RuleOutcome> {
    let policy = config.policy;
    if !policy.permits(&movie.locks, FieldCode::Tagline) {
        debug!(movie = %movie.title, "Tagline locked, skipping");
        return Ok(RuleOutcome::Skipped);
    }
    if !policy.force && !movie.tagline.is_empty() {
        return Ok(RuleOutcome::Skipped);
    }

    let preferred = if config.prefer_secondary_language {
        Language::Secondary
    } else {
        Language::Primary
    };

    let mut tagline = ctx.movie(preferred).await?.tagline.clone();
    if tagline.is_empty() {
        tagline = ctx.movie(preferred.other()).await?.tagline.clone();
    }
    if tagline.is_empty() {
        debug!(movie = %movie.title, "No tagline in either language");
        return Ok(RuleOutcome::Skipped);
    }

    info!(movie = %movie.title, tagline = %tagline, "Tagline");
    ledger.stage(Target::MetadataItem(movie.id), Column::Tagline, tagline);
    policy.complete(&mut movie.locks, FieldCode::Tagline);
    Ok(RuleOutcome::Applied)
}

pub async fn genres(
    movie: &mut MediaRecord,
    store: &CatalogStore,
    ledger: &mut MutationLedger,
    config: &GenresConfig,
) -> UnifyResult<RuleOutcome> {
    let policy = config.policy;
    if !policy.permits(&movie.locks, FieldCode::Genre) {
        debug!(movie = %movie.title, "Genres locked, skipping");
        return Ok(RuleOutcome::Skipped);
    }

    // Rebuilt per movie: earlier movies may have renamed tags
    let mut catalog = TagCatalog::from_entries(store.tag_catalog(TAG_TYPE_GENRE).await?);
    catalog.overlay(ledger.staged_tag_names());
    let memberships = store.memberships(movie.id, TAG_TYPE_GENRE).await?;

    let reconciliation = reconcile(&catalog, &memberships, &config.renames);
    for rename in &reconciliation.renames {
        info!(movie = %movie.title, from = %rename.from, to = %rename.to, "Renaming genre");
    }
    if !reconciliation.rewrites.is_empty() {
        info!(movie = %movie.title, count = reconciliation.rewrites.len(), "Repointing genres");
    }
    if !reconciliation.removals.is_empty() {
        info!(movie = %movie.title, count = reconciliation.removals.len(), "Dropping duplicate genres");
    }
    reconciliation.stage_into(ledger);

    policy.complete(&mut movie.locks, FieldCode::Genre);
    Ok(RuleOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> BTreeMap<String, String> {
        [("se/Btl", "Btl"), ("se/15", "15"), ("se/11", "11")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sort_title_same_titles() {
        assert_eq!(compose_sort_title("Alien", "Alien", ":", false), "Alien");
    }

    #[test]
    fn test_sort_title_combined_and_inverted() {
        assert_eq!(
            compose_sort_title("The Hunt", "Jakten", ":", false),
            "The Hunt : Jakten"
        );
        assert_eq!(
            compose_sort_title("The Hunt", "Jakten", "-", true),
            "Jakten - The Hunt"
        );
    }

    #[test]
    fn test_rating_mapping_case_insensitive() {
        assert_eq!(map_rating(Some("btl"), &mapping(), "???"), "se/Btl");
        assert_eq!(map_rating(Some("15"), &mapping(), "???"), "se/15");
    }

    #[test]
    fn test_unmapped_or_missing_rating_is_unknown() {
        assert_eq!(map_rating(Some("R"), &mapping(), "???"), "???");
        assert_eq!(map_rating(None, &mapping(), "???"), "???");
    }
}
