//! Organization model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::models::payment::{PaymentAuthorization, PaymentAuthorizationEnv, PaymentGateway, PaymentMethod};
use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::snake_to_words;

/// Documents an organization must provide before approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationDocument {
    IdentificationDocument,
    EventCreationLicenceDocument,
    BusinessRegistrationCertificate,
}

impl OrganizationDocument {
    pub const ALL: [OrganizationDocument; 3] = [
        OrganizationDocument::IdentificationDocument,
        OrganizationDocument::EventCreationLicenceDocument,
        OrganizationDocument::BusinessRegistrationCertificate,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            OrganizationDocument::IdentificationDocument => "identification_document",
            OrganizationDocument::EventCreationLicenceDocument => "event_creation_licence_document",
            OrganizationDocument::BusinessRegistrationCertificate => "business_registration_certificate",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|doc| doc.key() == key)
    }

    pub fn words(&self) -> String {
        snake_to_words(self.key())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationCertification {
    pub id: Uuid,
    pub affiliation: String,
    pub identification_document: Option<Json<FileObject>>,
    pub event_creation_licence_document: Option<Json<FileObject>>,
    pub business_registration_certificate: Option<Json<FileObject>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationCertification {
    pub fn document(&self, doc: OrganizationDocument) -> Option<&FileObject> {
        let column = match doc {
            OrganizationDocument::IdentificationDocument => &self.identification_document,
            OrganizationDocument::EventCreationLicenceDocument => &self.event_creation_licence_document,
            OrganizationDocument::BusinessRegistrationCertificate => &self.business_registration_certificate,
        };
        column.as_ref().map(|json| &json.0)
    }

    pub fn set_document(&mut self, doc: OrganizationDocument, file: FileObject) {
        let column = match doc {
            OrganizationDocument::IdentificationDocument => &mut self.identification_document,
            OrganizationDocument::EventCreationLicenceDocument => &mut self.event_creation_licence_document,
            OrganizationDocument::BusinessRegistrationCertificate => &mut self.business_registration_certificate,
        };
        *column = Some(Json(file));
    }

    /// All three documents are present
    pub fn in_place(&self) -> bool {
        OrganizationDocument::ALL.iter().all(|doc| self.document(*doc).is_some())
    }

    /// An organization account can be approved only with its documents in place
    pub fn ensure_in_place(&self) -> Result<()> {
        if !self.in_place() {
            return Err(AppError::forbidden("organization account certification are not in place"));
        }
        Ok(())
    }
}

/// Methods and credentials for one gateway environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEnvConfiguration {
    pub methods: Vec<PaymentMethod>,
    pub authorization: PaymentAuthorization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationGatewayEntry {
    pub name: String,
    pub image: String,
    pub enable: bool,
    pub env: PaymentAuthorizationEnv,
    #[serde(default)]
    pub configuration: BTreeMap<PaymentAuthorizationEnv, GatewayEnvConfiguration>,
}

impl OrganizationGatewayEntry {
    /// Configuration of the currently selected environment
    pub fn current(&self) -> Option<&GatewayEnvConfiguration> {
        self.configuration.get(&self.env)
    }

    pub fn configured_envs(&self) -> Vec<PaymentAuthorizationEnv> {
        self.configuration.keys().copied().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationConfiguration {
    pub id: Uuid,
    pub affiliation: String,
    pub payment_gateway: Json<BTreeMap<PaymentGateway, OrganizationGatewayEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationConfiguration {
    pub fn gateway(&self, gateway: PaymentGateway) -> Option<&OrganizationGatewayEntry> {
        self.payment_gateway.get(&gateway)
    }

    /// Credentials of the gateway's current environment
    pub fn current_authorization(&self, gateway: PaymentGateway) -> Option<&PaymentAuthorization> {
        self.gateway(gateway)
            .and_then(OrganizationGatewayEntry::current)
            .map(|config| &config.authorization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certification() -> OrganizationCertification {
        OrganizationCertification {
            id: Uuid::new_v4(),
            affiliation: "org@example.com".to_string(),
            identification_document: None,
            event_creation_licence_document: None,
            business_registration_certificate: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_in_place_requires_all_documents() {
        let mut cert = certification();
        assert!(!cert.in_place());
        assert!(cert.ensure_in_place().is_err());

        for (index, doc) in OrganizationDocument::ALL.into_iter().enumerate() {
            cert.set_document(doc, FileObject::new(format!("certificates/x/{}.pdf", index), "application/pdf"));
        }
        assert!(cert.in_place());
        assert!(cert.ensure_in_place().is_ok());
    }

    #[test]
    fn test_document_parse_and_words() {
        let doc = OrganizationDocument::parse("event_creation_licence_document").unwrap();
        assert_eq!(doc.words(), "event creation licence document");
        assert!(OrganizationDocument::parse("passport").is_none());
    }

    #[test]
    fn test_current_env_configuration() {
        let authorization = PaymentAuthorization {
            public_key: "pk".to_string(),
            secret_key: "sk".to_string(),
        };
        let mut configuration = BTreeMap::new();
        configuration.insert(PaymentAuthorizationEnv::Test, GatewayEnvConfiguration {
            methods: Vec::new(),
            authorization: authorization.clone(),
        });
        let mut entry = OrganizationGatewayEntry {
            name: "Stripe".to_string(),
            image: "payment_gateway/logo/stripe.png".to_string(),
            enable: true,
            env: PaymentAuthorizationEnv::Test,
            configuration,
        };
        assert_eq!(entry.current().map(|c| &c.authorization), Some(&authorization));
        assert_eq!(entry.configured_envs(), vec![PaymentAuthorizationEnv::Test]);

        entry.env = PaymentAuthorizationEnv::Live;
        assert!(entry.current().is_none());
    }
}
