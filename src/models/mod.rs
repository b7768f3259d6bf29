//! Data models module
//!
//! This module contains all data structures used throughout the application,
//! along with the business rules that guard their state changes.

pub mod common;
pub mod user;
pub mod admin;
pub mod organization;
pub mod event;
pub mod payment;
pub mod team;
pub mod volunteer;

// Re-export commonly used models
pub use common::{FileObject, SupportCertificateMime, SupportImageMime};
pub use user::{User, UserInformation, UserModifyRequest, UserModifyStatus, UserStatus, UserTitle};
pub use admin::{AdminConfiguration, AdminGatewayEntry, AdminProfile, AdminRole, Administrator};
pub use organization::{
    GatewayEnvConfiguration, OrganizationCertification, OrganizationConfiguration, OrganizationDocument,
    OrganizationGatewayEntry,
};
pub use event::{Event, EventAffiliation, EventFilter, EventStatus, PosterRenderResource};
pub use payment::{
    PaymentAuthorization, PaymentAuthorizationEnv, PaymentGateway, PaymentMethod, PaymentProduct,
    PaymentTransactionStatus, ProductAffiliation, ProductBindType, ProductOption,
};
pub use team::TeamConfiguration;
pub use volunteer::{VolunteerConfiguration, VolunteerFilter, VolunteerRecord};
