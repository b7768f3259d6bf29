//! Organization gateway setup and certification documents

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::extract::{invalid, MultipartForm, ValidJson, ValidQuery};
use crate::handlers::{notify_certification_ready, UploadResult};
use crate::middleware::auth::AuthUser;
use crate::models::admin::AdminConfiguration;
use crate::models::organization::{GatewayEnvConfiguration, OrganizationDocument, OrganizationGatewayEntry};
use crate::models::payment::{PaymentAuthorization, PaymentAuthorizationEnv, PaymentGateway, PaymentMethod};
use crate::models::user::{User, UserTitle};
use crate::response::{ok, ApiResponse};
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::normalize_email;
use crate::utils::logging::{log_api_error, log_user_action};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/configuration", get(configuration))
        .route("/payments/enabled", get(enabled_payments))
        .route("/payments/added", get(added_payments))
        .route("/payments", post(add_payment))
        .route("/certificates", post(upload_certificate).get(certificate))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationConfigurationView {
    pub id: Uuid,
    pub affiliation: String,
    pub payment_gateway: BTreeMap<PaymentGateway, OrganizationGatewayEntry>,
}

pub async fn configuration(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<OrganizationConfigurationView>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let config = state.db.organizations.get_or_create_configuration(&caller.email).await?;

    let payment_gateway = config
        .payment_gateway
        .0
        .into_iter()
        .map(|(gateway, mut entry)| {
            entry.image = state.access_url(&entry.image);
            (gateway, entry)
        })
        .collect();

    Ok(ok(OrganizationConfigurationView {
        id: config.id,
        affiliation: config.affiliation,
        payment_gateway,
    }))
}

/// Gateway configuration granted by the organization's administrator
async fn administrator_configuration(state: &AppState, organization: &User) -> Result<AdminConfiguration> {
    let not_found = || AppError::not_found("there are no enabled payment gateway for this account");
    let affiliation = organization.affiliation.as_deref().ok_or_else(not_found)?;
    state.db.admin.find_configuration(affiliation).await?.ok_or_else(not_found)
}

#[derive(Debug, Serialize)]
pub struct EnabledGateway {
    pub key: PaymentGateway,
    pub name: String,
    pub logo: String,
}

pub async fn enabled_payments(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<Vec<EnabledGateway>>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let admin_config = administrator_configuration(&state, caller).await?;

    let gateways = admin_config
        .enabled_gateways()
        .map(|(gateway, entry)| EnabledGateway {
            key: *gateway,
            name: entry.name.clone(),
            logo: state.access_url(&entry.image),
        })
        .collect();
    Ok(ok(gateways))
}

#[derive(Debug, Serialize)]
pub struct GatewayEnvs {
    pub enabled: Vec<PaymentAuthorizationEnv>,
    pub current: PaymentAuthorizationEnv,
}

#[derive(Debug, Serialize)]
pub struct AddedGateway {
    pub key: PaymentGateway,
    pub name: String,
    pub enabled: bool,
    pub env: GatewayEnvs,
    pub logo: String,
    pub methods: Vec<PaymentMethod>,
}

pub async fn added_payments(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<Vec<AddedGateway>>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let Some(config) = state.db.organizations.find_configuration(&caller.email).await? else {
        return Ok(ok(Vec::new()));
    };

    let gateways = config
        .payment_gateway
        .iter()
        .map(|(gateway, entry)| AddedGateway {
            key: *gateway,
            name: entry.name.clone(),
            enabled: entry.enable,
            env: GatewayEnvs {
                enabled: entry.configured_envs(),
                current: entry.env,
            },
            logo: state.access_url(&entry.image),
            methods: entry.current().map(|env| env.methods.clone()).unwrap_or_default(),
        })
        .collect();
    Ok(ok(gateways))
}

/// Verify credentials by listing the methods they unlock
/// Payment methods the gateway reports for `authorization`, refusing credentials with none
pub async fn verified_methods(
    state: &AppState,
    gateway: PaymentGateway,
    authorization: &PaymentAuthorization,
) -> Result<Vec<PaymentMethod>> {
    match state
        .services
        .payment_client
        .payment_methods(gateway, authorization)
        .await
    {
        Ok(methods) if !methods.is_empty() => Ok(methods),
        Ok(_) => Err(AppError::forbidden("payment gateway authorization failed")),
        Err(e) => {
            log_api_error("payment_methods", &e.to_string(), Some(gateway.key()));
            Err(e.unless_timeout(|_| AppError::forbidden("payment gateway authorization failed")))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddPaymentForm {
    pub category: PaymentGateway,
    pub env: PaymentAuthorizationEnv,
    pub authorization: PaymentAuthorization,
}

pub async fn add_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<AddPaymentForm>,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let admin_config = administrator_configuration(&state, caller).await?;
    if !admin_config.is_enabled(form.category) {
        return Err(AppError::forbidden("payment gateway category not enabled"));
    }

    let methods = verified_methods(&state, form.category, &form.authorization).await?;

    let config = state.db.organizations.get_or_create_configuration(&caller.email).await?;
    let mut gateways = config.payment_gateway.0;
    let entry = gateways.entry(form.category).or_insert_with(|| OrganizationGatewayEntry {
        name: form.category.display_name(),
        image: form.category.logo_path(),
        enable: true,
        env: form.env,
        configuration: BTreeMap::new(),
    });
    entry.enable = true;
    entry.env = form.env;
    entry.configuration.insert(
        form.env,
        GatewayEnvConfiguration {
            methods,
            authorization: form.authorization,
        },
    );
    state.db.organizations.update_gateways(config.id, &gateways).await?;

    log_user_action(&caller.email, "add_payment_gateway", Some(form.category.key()));
    Ok(ok("payment gateway added successfully"))
}

pub async fn upload_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    form: MultipartForm,
) -> Result<ApiResponse<UploadResult>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let category = form.required("category")?;
    let document =
        OrganizationDocument::parse(&category).ok_or_else(|| invalid("body", "category", "unknown certificate category"))?;
    let file = form.required_file("file")?;

    if state.db.organizations.find_certification(&caller.email).await?.is_none() {
        return Err(AppError::not_found("organization certificate not found"));
    }

    let base_path = format!("certificates/{}/{}", caller.id, document.key());
    let stored = state
        .services
        .storage_service
        .upload_certificate(&base_path, &file.content_type, file.bytes.clone())
        .await?;
    let certification = state
        .db
        .organizations
        .set_document(&caller.email, document, stored)
        .await?;

    if certification.in_place() {
        if let Some(affiliation) = caller.affiliation.as_deref() {
            notify_certification_ready(&state, affiliation, &caller.name).await;
        }
    }

    Ok(ok(UploadResult::new(
        format!("{} upload successfully", document.words()),
        &file.bytes,
    )))
}

#[derive(Debug, Deserialize)]
pub struct CertificateQuery {
    pub email: Option<String>,
    pub category: OrganizationDocument,
    #[serde(default)]
    pub download: bool,
}

/// Certificate as a signed download URL or an inline data URI
pub async fn certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<CertificateQuery>,
) -> Result<ApiResponse<String>> {
    let caller = auth.require(&[UserTitle::Admin, UserTitle::Organization])?;
    let affiliation = match caller.title {
        UserTitle::Admin => query
            .email
            .as_deref()
            .map(normalize_email)
            .ok_or_else(|| invalid("query", "email", "field required"))?,
        _ => caller.email.clone(),
    };

    let certification = state.db.organizations.find_certification(&affiliation).await?;
    let file = certification
        .as_ref()
        .and_then(|cert| cert.document(query.category))
        .ok_or_else(|| AppError::not_found("certificate not found"))?;

    if query.download {
        Ok(ok(state.access_url(&file.file_path)))
    } else {
        Ok(ok(state.services.storage_service.data_uri(file).await?))
    }
}
