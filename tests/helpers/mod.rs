//! Test helpers module
//!
//! Shared setup for the integration tests: a migrated database, wiremock
//! upstreams, randomized test data and a router harness.

#![allow(dead_code)]

pub mod database_helper;
pub mod mock_servers;
pub mod test_app;
pub mod test_data;

pub use database_helper::*;
pub use mock_servers::*;
pub use test_app::*;
pub use test_data::*;
