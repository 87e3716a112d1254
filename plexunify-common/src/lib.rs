//! # plexunify common library
//!
//! Shared code for the plexunify workspace:
//! - Error and result types
//! - Configuration file resolution and loading
//! - Catalog database access (open, backup rotation)

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
