//! Errors shared by the plexunify crates

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing, unreadable or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The catalog file does not exist; it is never created here
    #[error("Catalog database not found: {}", .0.display())]
    CatalogNotFound(PathBuf),

    /// Backup could not be taken; nothing may be written without one
    #[error("Backup failed: {0}")]
    Backup(String),
}
