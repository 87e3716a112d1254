//! Test Helper Utilities
//!
//! Shared utilities for the plexunify integration tests
#![allow(dead_code)]

pub mod catalog;
pub mod fakes;

// Re-export commonly used items
pub use catalog::{test_config, TestCatalog, SECTION_ID};
pub use fakes::{collection, in_collection, movie, FakeMediaServer, FakeProvider, FakeRatings};
