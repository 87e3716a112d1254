//! Catalog database connection
//!
//! The catalog is owned by the media server; it is opened, never created.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout while the media server holds a write lock
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open an existing catalog database
///
/// The pool is limited to one connection: a run is a single sequential
/// pass and the catalog is the only shared mutable resource.
pub async fn open_catalog(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::CatalogNotFound(db_path.to_path_buf()));
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(false)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    info!("Opened catalog database: {}", db_path.display());

    Ok(pool)
}
