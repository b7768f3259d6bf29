//! FRSaaS backend
//!
//! Multi-tenant HTTP backend for event fundraising and e-commerce
//! organizations. Admins approve organizations, organizations configure
//! payment gateways, publish events and products, and buyers check out
//! through the gateway aggregator.

pub mod app;
pub mod config;
pub mod database;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use app::build_router;
pub use config::Settings;
pub use response::{ApiResponse, ResponseCode};
pub use state::AppState;
pub use utils::errors::{AppError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
