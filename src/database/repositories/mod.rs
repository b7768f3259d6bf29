//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod user;
pub mod admin;
pub mod organization;
pub mod event;
pub mod payment;
pub mod team;
pub mod volunteer;

// Re-export repositories
pub use user::{ModifyRequestRepository, UserRepository};
pub use admin::AdminRepository;
pub use organization::OrganizationRepository;
pub use event::EventRepository;
pub use payment::PaymentProductRepository;
pub use team::TeamRepository;
pub use volunteer::VolunteerRepository;
