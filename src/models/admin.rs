//! Admin model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::payment::PaymentGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "admin_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Super,
    #[default]
    General,
}

/// Azure AD administrator
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Administrator {
    pub id: Uuid,
    pub email: String,
    pub role: AdminRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Administrator {
    pub fn has_role(&self, allowed: &[AdminRole]) -> bool {
        allowed.contains(&self.role)
    }
}

/// Microsoft Graph `/v1.0/me` profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: String,
    pub mail: String,
    pub display_name: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    pub user_principal_name: String,
}

/// Gateway availability granted by an administrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminGatewayEntry {
    pub name: String,
    pub image: String,
    pub enable: bool,
}

impl AdminGatewayEntry {
    pub fn for_gateway(gateway: PaymentGateway) -> Self {
        Self {
            name: gateway.display_name(),
            image: gateway.logo_path(),
            enable: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminConfiguration {
    pub id: Uuid,
    pub affiliation: String,
    pub payment_gateway: Json<BTreeMap<PaymentGateway, AdminGatewayEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminConfiguration {
    /// Every known gateway, enabled
    pub fn default_gateways() -> BTreeMap<PaymentGateway, AdminGatewayEntry> {
        PaymentGateway::ALL
            .into_iter()
            .map(|gateway| (gateway, AdminGatewayEntry::for_gateway(gateway)))
            .collect()
    }

    pub fn is_enabled(&self, gateway: PaymentGateway) -> bool {
        self.payment_gateway
            .get(&gateway)
            .map(|entry| entry.enable)
            .unwrap_or(false)
    }

    pub fn enabled_gateways(&self) -> impl Iterator<Item = (&PaymentGateway, &AdminGatewayEntry)> {
        self.payment_gateway.iter().filter(|(_, entry)| entry.enable)
    }
}
