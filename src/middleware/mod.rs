//! Middleware module
//!
//! This module contains request extractors and layers shared by all routes

pub mod auth;
pub mod logging;
pub mod rate_limit;

// Re-export commonly used middleware
pub use auth::{bearer_token, AdminUser, AuthUser, HktdcSession};
pub use logging::log_requests;
pub use rate_limit::RateLimitMiddleware;
