//! Run configuration
//!
//! Read once at startup from a TOML file (see `plexunify_common::config` for
//! path resolution). Each rule section flattens a [`RulePolicy`] next to its
//! own options:
//!
//! ```toml
//! [tagline]
//! enabled = true
//! respect_lock = true
//! lock_after_completion = true
//! prefer_secondary_language = false
//! ```

use crate::deletion::LockComparison;
use crate::locks::RulePolicy;
use crate::providers::RetryPolicy;
use plexunify_common::config::LoggingConfig;
use plexunify_common::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration of one run
#[derive(Debug, Clone, Deserialize)]
pub struct UnifyConfig {
    /// Refuse to run while set; ships enabled so a fresh config is inert
    #[serde(default = "default_true")]
    pub safety_lock: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub backup: BackupConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub media_server: Option<MediaServerConfig>,
    #[serde(default)]
    pub sort_title: SortTitleConfig,
    #[serde(default)]
    pub content_rating: ContentRatingConfig,
    #[serde(default)]
    pub tagline: TaglineConfig,
    #[serde(default)]
    pub genres: GenresConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
}

/// Which catalog and library to process
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub database_path: PathBuf,
    /// Library section name
    pub library: String,
    /// Maximum number of movies processed per run
    #[serde(default)]
    pub modify_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    pub directory: PathBuf,
    #[serde(default = "default_retention_count")]
    pub retention_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitConfig {
    /// Prompt before writing
    #[serde(default = "default_true")]
    pub confirm: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self { confirm: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_primary_language")]
    pub primary_language: String,
    #[serde(default = "default_secondary_language")]
    pub secondary_language: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            primary_language: default_primary_language(),
            secondary_language: default_secondary_language(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaServerConfig {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortTitleConfig {
    #[serde(flatten)]
    pub policy: RulePolicy,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub invert_title_positions: bool,
}

impl Default for SortTitleConfig {
    fn default() -> Self {
        Self {
            policy: RulePolicy::default(),
            delimiter: default_delimiter(),
            invert_title_positions: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentRatingConfig {
    #[serde(flatten)]
    pub policy: RulePolicy,
    #[serde(default)]
    pub country_code: String,
    /// Stored when the provider label has no mapping
    #[serde(default = "default_unknown_rating")]
    pub unknown_rating: String,
    /// Stored label -> provider label
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

impl Default for ContentRatingConfig {
    fn default() -> Self {
        Self {
            policy: RulePolicy::default(),
            country_code: String::new(),
            unknown_rating: default_unknown_rating(),
            mapping: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaglineConfig {
    #[serde(flatten)]
    pub policy: RulePolicy,
    #[serde(default)]
    pub prefer_secondary_language: bool,
}

/// One rename rule: every source tag converges on `target`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenameRule {
    pub target: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenresConfig {
    #[serde(flatten)]
    pub policy: RulePolicy,
    /// Applied in file order
    #[serde(default)]
    pub renames: Vec<RenameRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionsConfig {
    #[serde(flatten)]
    pub policy: RulePolicy,
    #[serde(default)]
    pub prefer_secondary_language: bool,
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
    #[serde(default)]
    pub min_votes: u64,
    #[serde(default)]
    pub min_score: f64,
    #[serde(default)]
    pub min_qualified_members: usize,
    #[serde(default)]
    pub min_total_score: f64,
    #[serde(default)]
    pub allow_creation: bool,
    #[serde(default = "default_creation_poll_attempts")]
    pub creation_poll_attempts: u32,
    #[serde(default = "default_creation_poll_delay_ms")]
    pub creation_poll_delay_ms: u64,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default = "default_lock_threshold")]
    pub lock_threshold: usize,
    #[serde(default)]
    pub lock_comparison: LockComparison,
    #[serde(default)]
    pub update_summary: bool,
    #[serde(default)]
    pub update_sort_title: bool,
    #[serde(default)]
    pub update_poster: bool,
    #[serde(default)]
    pub poster_directory: Option<PathBuf>,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            policy: RulePolicy::default(),
            prefer_secondary_language: false,
            suffixes: default_suffixes(),
            min_votes: 0,
            min_score: 0.0,
            min_qualified_members: 0,
            min_total_score: 0.0,
            allow_creation: false,
            creation_poll_attempts: default_creation_poll_attempts(),
            creation_poll_delay_ms: default_creation_poll_delay_ms(),
            auto_delete: false,
            lock_threshold: default_lock_threshold(),
            lock_comparison: LockComparison::default(),
            update_summary: false,
            update_sort_title: false,
            update_poster: false,
            poster_directory: None,
        }
    }
}

impl CollectionsConfig {
    pub fn creation_poll_delay(&self) -> Duration {
        Duration::from_millis(self.creation_poll_delay_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_retention_count() -> usize {
    3
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_primary_language() -> String {
    "en-US".to_string()
}

fn default_secondary_language() -> String {
    "en-US".to_string()
}

fn default_delimiter() -> String {
    ":".to_string()
}

fn default_unknown_rating() -> String {
    "???".to_string()
}

fn default_suffixes() -> Vec<String> {
    vec!["Collection".to_string()]
}

fn default_creation_poll_attempts() -> u32 {
    5
}

fn default_creation_poll_delay_ms() -> u64 {
    2000
}

fn default_lock_threshold() -> usize {
    1
}

impl UnifyConfig {
    /// True when any enabled rule needs the metadata provider
    pub fn needs_provider(&self) -> bool {
        self.sort_title.policy.enabled
            || self.content_rating.policy.enabled
            || self.tagline.policy.enabled
            || self.collections.policy.enabled
    }

    /// Reject configurations the run cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.safety_lock {
            return Err(Error::Config(
                "safety_lock is activated; set `safety_lock = false` to allow writes".to_string(),
            ));
        }

        if self.catalog.library.trim().is_empty() {
            return Err(Error::Config("catalog.library must name a library section".to_string()));
        }

        if self.catalog.modify_limit == Some(0) {
            return Err(Error::Config("catalog.modify_limit must be at least 1".to_string()));
        }

        if self.backup.retention_count == 0 {
            return Err(Error::Config("backup.retention_count must be at least 1".to_string()));
        }

        if self.network.retry_attempts == 0 {
            return Err(Error::Config("network.retry_attempts must be at least 1".to_string()));
        }

        if self.needs_provider() && self.tmdb.api_key.trim().is_empty() {
            return Err(Error::Config(
                "tmdb.api_key is required when a metadata rule is enabled".to_string(),
            ));
        }

        if self.content_rating.policy.enabled && self.content_rating.country_code.trim().is_empty() {
            return Err(Error::Config(
                "content_rating.country_code is required when content ratings are enabled".to_string(),
            ));
        }

        for rule in &self.genres.renames {
            if rule.target.trim().is_empty() {
                return Err(Error::Config("genres.renames entries need a target".to_string()));
            }
        }

        let collections = &self.collections;
        if collections.policy.enabled {
            if collections.update_poster && collections.poster_directory.is_none() {
                return Err(Error::Config(
                    "collections.poster_directory is required when update_poster is set".to_string(),
                ));
            }
            if collections.allow_creation && self.media_server.is_none() {
                return Err(Error::Config(
                    "[media_server] is required when collections.allow_creation is set".to_string(),
                ));
            }
        }

        Ok(())
    }
}
