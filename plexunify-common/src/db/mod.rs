//! Catalog database access

pub mod backup;
pub mod init;

pub use backup::backup_database;
pub use init::open_catalog;
