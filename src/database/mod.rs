//! Database module
//!
//! This module handles database connections and operations

pub mod connection;
pub mod repositories;
pub mod service;

// Re-export commonly used database components
pub use connection::{create_pool, health_check, run_migrations, DatabasePool, PoolOptions};
pub use repositories::{
    AdminRepository, EventRepository, ModifyRequestRepository, OrganizationRepository, PaymentProductRepository,
    TeamRepository, UserRepository, VolunteerRepository,
};
pub use service::{DatabaseService, EventCounts, OrganizationRegistration};
