//! plexunify library
//!
//! Metadata reconciliation and commit engine for a Plex movie library.
//! Exposed as a library for the binary and the integration tests.

pub mod cache;
pub mod collections;
pub mod commit;
pub mod config;
pub mod deletion;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod pipeline;
pub mod providers;
pub mod rules;
pub mod store;
pub mod tags;
pub mod types;

pub use crate::config::UnifyConfig;
pub use crate::error::{ProviderError, UnifyError, UnifyResult};
pub use crate::ledger::MutationLedger;
pub use crate::pipeline::{RunReport, Unifier};
pub use crate::store::CatalogStore;
