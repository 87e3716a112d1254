//! plexunify - Plex catalog metadata reconciliation
//!
//! Reads the movies of one library section, merges provider metadata into
//! them while honouring field locks, and writes every change in a single
//! transaction after backing up the catalog.

use anyhow::{Context, Result};
use clap::Parser;
use plexunify::commit::{AutoConfirm, CommitOptions, CommitOutcome, Confirm, StdinConfirm};
use plexunify::providers::http::HttpFetcher;
use plexunify::providers::{ImdbRatings, MediaServer, PlexServer, TmdbClient};
use plexunify::{CatalogStore, Unifier, UnifyConfig};
use plexunify_common::config::{load_toml, resolve_config_path, CONFIG_ENV_VAR};
use plexunify_common::db::open_catalog;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for plexunify
#[derive(Parser, Debug)]
#[command(name = "plexunify")]
#[command(about = "Reconcile Plex movie metadata with TMDb and IMDb")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/plexunify/config.toml)
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Commit without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Describe the changes without backing up or writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR)?;
    let config: UnifyConfig = load_toml(&config_path)?;

    // RUST_LOG wins over the config file
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting plexunify v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config: {}", config_path.display());

    config.validate()?;

    let pool = open_catalog(&config.catalog.database_path)
        .await
        .with_context(|| format!("Failed to open catalog {}", config.catalog.database_path.display()))?;
    info!("Catalog: {}", config.catalog.database_path.display());
    let store = CatalogStore::new(pool);

    let network = &config.network;
    let tmdb = TmdbClient::new(
        config.tmdb.api_key.clone(),
        HttpFetcher::new(network.timeout(), network.retry_policy())?,
    );
    let imdb = ImdbRatings::new(HttpFetcher::new(network.timeout(), network.retry_policy())?);
    let plex = match &config.media_server {
        Some(server) => Some(PlexServer::new(
            server.base_url.clone(),
            server.token.clone(),
            network.timeout(),
        )?),
        None => None,
    };
    let media_server = plex.as_ref().map(|p| p as &dyn MediaServer);

    let options = CommitOptions {
        backup_dir: config.backup.directory.clone(),
        backup_stem: backup_stem(&config.catalog.database_path),
        retention_count: config.backup.retention_count,
        dry_run: args.dry_run,
    };
    let mut confirm: Box<dyn Confirm> = if args.yes || !config.commit.confirm {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(StdinConfirm)
    };

    let unifier = Unifier::new(&config, store, &tmdb, &imdb, media_server);
    let report = unifier.run(&options, confirm.as_mut()).await?;

    if !report.skipped.is_empty() {
        warn!("Skipped {} movie(s): {}", report.skipped.len(), report.skipped.join(", "));
    }
    match &report.commit {
        CommitOutcome::Empty => info!("Catalog already up to date"),
        CommitOutcome::DryRun(summary) => info!("Dry run: would write {}", summary),
        CommitOutcome::Declined(summary) => warn!("Declined: {} not written", summary),
        CommitOutcome::Committed { summary, backup, .. } => {
            info!("Wrote {} (backup: {})", summary, backup.display())
        }
    }

    if let Some(e) = &report.stopped_by {
        error!("Run stopped early: {}", e);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Backup file prefix derived from the catalog file name
fn backup_stem(database_path: &std::path::Path) -> String {
    database_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("catalog")
        .to_string()
}
