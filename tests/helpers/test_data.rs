//! Test data helpers for creating test objects
//!
//! Builders for accounts, events and products with randomized but valid
//! values so repository tests do not collide on unique columns.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;

use frsaas::models::event::{CreateEventRequest, EventAffiliation};
use frsaas::models::payment::{CreateProductRequest, ProductAffiliation, ProductBindType, ProductOption};
use frsaas::models::user::{CreateUserRequest, UserStatus, UserTitle};

/// Unique lower-case email
pub fn fake_email() -> String {
    let email: String = SafeEmail().fake();
    format!("{}-{}", uuid::Uuid::new_v4().simple(), email.to_lowercase())
}

/// Account creation request with a random identity
pub fn user_request(title: UserTitle, affiliation: Option<&str>) -> CreateUserRequest {
    let name: String = Name().fake();
    CreateUserRequest {
        email: fake_email(),
        username: name.clone(),
        name,
        title,
        status: UserStatus::default(),
        password_hash: None,
        affiliation: affiliation.map(str::to_string),
        sso_uid: None,
    }
}

/// Organization account under `administrator`
pub fn organization_request(administrator: &str) -> CreateUserRequest {
    let mut request = user_request(UserTitle::Organization, Some(administrator));
    request.name = CompanyName().fake();
    request
}

/// Event running from tomorrow for a week
pub fn event_request(creator: &str, administrator: Option<&str>) -> CreateEventRequest {
    let start_time = Utc::now() + Duration::days(1);
    CreateEventRequest {
        name: format!("{} Charity Run", CompanyName().fake::<String>()),
        fundraising_licence_number: format!("FR-{}", (1000..9999).fake::<u32>()),
        affiliation: EventAffiliation {
            creator: creator.to_string(),
            administrator: administrator.map(str::to_string),
        },
        start_time,
        end_time: start_time + Duration::days(7),
    }
}

/// Product with two options bound to an event
pub fn product_request(creator: &str, event_id: Option<uuid::Uuid>) -> CreateProductRequest {
    let options = BTreeMap::from([
        (
            "small".to_string(),
            ProductOption {
                value: "small".to_string(),
                name: "Small".to_string(),
                unit_amount: 5000,
            },
        ),
        (
            "large".to_string(),
            ProductOption {
                value: "large".to_string(),
                name: "Large".to_string(),
                unit_amount: 8000,
            },
        ),
    ]);

    CreateProductRequest {
        name: "Charity T-shirt".to_string(),
        brief_description: "Cotton tee".to_string(),
        detailed_description: "Organic cotton tee printed for the run".to_string(),
        stocks: 100,
        options,
        affiliation: ProductAffiliation {
            creator: creator.to_string(),
            bind_id: event_id.map(|id| id.to_string()),
            bind_type: event_id.map(|_| ProductBindType::Event),
        },
    }
}
