//! Products, checkout sessions and gateway settings

use std::collections::{BTreeMap, HashSet};

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::handlers::extract::{invalid, MultipartForm, UploadedFile, ValidJson, ValidQuery};
use crate::handlers::organization::verified_methods;
use crate::middleware::auth::AuthUser;
use crate::models::common::{FileObject, SupportImageMime};
use crate::models::organization::{GatewayEnvConfiguration, OrganizationConfiguration};
use crate::models::payment::{
    CreateProductRequest, PaymentAuthorization, PaymentAuthorizationEnv, PaymentGateway, PaymentProduct,
    PaymentTransactionStatus, ProductAffiliation, ProductBindType, ProductOption, UpdateProductRequest,
};
use crate::models::user::{User, UserTitle};
use crate::response::{ok, ApiResponse};
use crate::services::payment::{CheckoutLineItem, CheckoutSessionRequest, TransactionRecord};
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};
use crate::utils::logging::{log_admin_action, log_user_action};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(transactions))
        .route("/products", get(products).post(create_product).put(update_product))
        .route("/checkout-sessions", post(create_checkout_session))
        .route("/checkout-sessions/{session_id}", get(checkout_session))
        .route("/gateways/configuration", post(configure_gateway))
        .route("/methods", get(methods))
}

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub gateway: PaymentGateway,
}

/// Credentials of the caller's current environment for a gateway
async fn caller_authorization(state: &AppState, caller: &User, gateway: PaymentGateway) -> Result<PaymentAuthorization> {
    let config = state
        .db
        .organizations
        .find_configuration(&caller.email)
        .await?
        .ok_or_else(|| AppError::not_found("organization configuration not found"))?;
    config
        .current_authorization(gateway)
        .cloned()
        .ok_or_else(|| AppError::not_found("payment gateway not exist"))
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub gateway: PaymentGateway,
    pub status: Option<PaymentTransactionStatus>,
}

pub async fn transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<TransactionQuery>,
) -> Result<ApiResponse<Vec<TransactionRecord>>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let authorization = caller_authorization(&state, caller, query.gateway).await?;

    let statuses: Vec<_> = query.status.into_iter().collect();
    let records = state
        .services
        .payment_client
        .transactions(query.gateway, &authorization, &statuses)
        .await?;
    Ok(ok(records.iter().map(TransactionRecord::from_value).collect()))
}

#[derive(Debug, Serialize)]
pub struct AmountRange {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub brief_description: String,
    pub detailed_description: String,
    pub images: Vec<String>,
    pub stocks: i32,
    pub options: Vec<ProductOption>,
    pub unit_amount_range: AmountRange,
}

impl ProductView {
    fn new(state: &AppState, product: &PaymentProduct) -> Self {
        Self::with_urls(product, |path| state.access_url(path))
    }

    fn with_urls(product: &PaymentProduct, access_url: impl Fn(&str) -> String) -> Self {
        let (min, max) = product.unit_amount_range();
        Self {
            id: product.id,
            name: product.name.clone(),
            brief_description: product.brief_description.clone(),
            detailed_description: product.detailed_description.clone(),
            images: product.images.iter().map(|image| access_url(&image.file_path)).collect(),
            stocks: product.stocks,
            options: product.option_list(),
            unit_amount_range: AmountRange { min, max },
        }
    }
}

/// A lone event-bound product is answered as an object
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProductsView {
    One(ProductView),
    Many(Vec<ProductView>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub product_id: Option<Uuid>,
    pub bind_id: Option<String>,
}

pub async fn products(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<ProductQuery>,
) -> Result<ApiResponse<ProductsView>> {
    let found = match query.product_id {
        Some(id) => vec![state
            .db
            .products
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("payment product not exist"))?],
        None => {
            state
                .db
                .products
                .list_by_creator(auth.email(), query.bind_id.as_deref())
                .await?
        }
    };

    let view = match found.as_slice() {
        [product] if product.is_event_bound() => ProductsView::One(ProductView::new(&state, product)),
        _ => ProductsView::Many(found.iter().map(|product| ProductView::new(&state, product)).collect()),
    };
    Ok(ok(view))
}

/// Options arrive as one JSON object per form value, keyed by their `value`
fn parse_options(raw: &[String]) -> Result<BTreeMap<String, ProductOption>> {
    raw.iter()
        .map(|text| {
            serde_json::from_str::<ProductOption>(text)
                .map(|option| (option.value.clone(), option))
                .map_err(|_| AppError::illegal_parameters("invalid options"))
        })
        .collect()
}

fn parse_stocks(form: &MultipartForm) -> Result<Option<i32>> {
    form.text("stocks")
        .filter(|text| !text.is_empty())
        .map(|text| text.parse().map_err(|_| invalid("body", "stocks", "value is not a valid integer")))
        .transpose()
}

/// Refuse the whole batch when one image has an unsupported type
fn ensure_images(images: &[&UploadedFile]) -> Result<()> {
    match images
        .iter()
        .find(|file| SupportImageMime::parse(&file.content_type).is_none())
    {
        Some(file) => Err(AppError::operating_failed(format!("{} upload image failed", file.file_name))),
        None => Ok(()),
    }
}

async fn upload_images(state: &AppState, product_id: Uuid, start: usize, images: &[&UploadedFile]) -> Result<Vec<FileObject>> {
    let mut stored = Vec::with_capacity(images.len());
    for (index, file) in images.iter().enumerate() {
        let base_path = format!("payment-products/{}/{}", product_id, start + index);
        let object = state
            .services
            .storage_service
            .upload_image(&base_path, &file.content_type, file.bytes.clone())
            .await
            .map_err(|_| AppError::operating_failed(format!("{} upload image failed", file.file_name)))?;
        stored.push(object);
    }
    Ok(stored)
}

#[derive(Debug, Serialize)]
pub struct CreatedProduct {
    pub ok: bool,
    pub id: Uuid,
}

pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    form: MultipartForm,
) -> Result<ApiResponse<CreatedProduct>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let options = parse_options(form.texts("options"))?;
    let bind_type = form
        .text("bindType")
        .filter(|text| !text.is_empty())
        .map(|text| {
            serde_json::from_value::<ProductBindType>(Value::String(text.to_string()))
                .map_err(|_| invalid("body", "bindType", "unknown bind type"))
        })
        .transpose()?;
    let images: Vec<_> = form.files("images").collect();
    ensure_images(&images)?;

    let product = state
        .db
        .products
        .create(CreateProductRequest {
            name: form.required("name")?,
            brief_description: form.required("briefDescription")?,
            detailed_description: form.text("detailedDescription").unwrap_or_default().to_string(),
            stocks: parse_stocks(&form)?.unwrap_or(0),
            options,
            affiliation: ProductAffiliation {
                creator: caller.email.clone(),
                bind_id: form.text("bindId").filter(|text| !text.is_empty()).map(str::to_string),
                bind_type,
            },
        })
        .await?;

    if !images.is_empty() {
        let stored = upload_images(&state, product.id, 0, &images).await?;
        state.db.products.set_images(product.id, &stored).await?;
    }

    log_user_action(&caller.email, "create_product", Some(&product.id.to_string()));
    Ok(ok(CreatedProduct { ok: true, id: product.id }))
}

pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    form: MultipartForm,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let product_id: Uuid = form
        .required("productId")?
        .parse()
        .map_err(|_| invalid("body", "productId", "value is not a valid uuid"))?;
    let product = state
        .db
        .products
        .find_by_id(product_id)
        .await?
        .filter(|product| product.affiliation.creator == caller.email)
        .ok_or_else(|| AppError::not_found("payment product not exist"))?;

    let raw_options = form.texts("options");
    let options = if raw_options.is_empty() {
        None
    } else {
        Some(parse_options(raw_options)?)
    };
    let images: Vec<_> = form.files("images").collect();
    ensure_images(&images)?;

    let text = |name: &str| form.text(name).filter(|text| !text.is_empty()).map(str::to_string);
    state
        .db
        .products
        .update(
            product.id,
            UpdateProductRequest {
                name: text("name"),
                brief_description: text("briefDescription"),
                detailed_description: text("detailedDescription"),
                stocks: parse_stocks(&form)?,
                options,
            },
        )
        .await?;

    if !images.is_empty() {
        let mut stored = product.images.0.clone();
        stored.extend(upload_images(&state, product.id, stored.len(), &images).await?);
        state.db.products.set_images(product.id, &stored).await?;
    }

    log_user_action(&caller.email, "update_product", Some(&product.id.to_string()));
    Ok(ok("payment product updated successfully"))
}

pub async fn checkout_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
    ValidQuery(query): ValidQuery<GatewayQuery>,
) -> Result<ApiResponse<Value>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let authorization = caller_authorization(&state, caller, query.gateway).await?;

    match state
        .services
        .payment_client
        .checkout_session(query.gateway, &authorization, &session_id)
        .await
    {
        Ok(session) if !session.is_null() => Ok(ok(session)),
        Ok(_) => Err(AppError::operating_failed("session not exist")),
        Err(e) => Err(e.unless_timeout(|e| AppError::operating_failed(e.to_string()))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsItem {
    pub product_id: Uuid,
    pub option: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempGoods {
    pub event_id: Uuid,
    pub name: String,
    pub unit_amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub goods: Option<Vec<GoodsItem>>,
    pub temp_goods: Option<TempGoods>,
    #[serde(default)]
    pub consumer: String,
    pub success_url: String,
    pub failed_url: String,
}

async fn seller_configuration(state: &AppState, creator: &str) -> Result<OrganizationConfiguration> {
    state
        .db
        .organizations
        .find_configuration(creator)
        .await?
        .ok_or_else(|| AppError::not_found("organization not exist"))
}

/// Line items for catalogue goods, plus the organization selling them
async fn goods_line_items(state: &AppState, goods: &[GoodsItem]) -> Result<(String, Vec<CheckoutLineItem>)> {
    let ids: Vec<Uuid> = goods
        .iter()
        .map(|item| item.product_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let products = state.db.products.find_many(&ids).await?;
    if products.len() != ids.len() {
        return Err(AppError::not_found("payment product not exist"));
    }

    let mut items = Vec::with_capacity(goods.len());
    for good in goods {
        let product = products
            .iter()
            .find(|product| product.id == good.product_id)
            .ok_or_else(|| AppError::not_found("payment product not exist"))?;
        let option = product
            .option(&good.option)
            .ok_or_else(|| AppError::illegal_parameters("product option not exist"))?;
        items.push(CheckoutLineItem {
            name: format!("{} - {}", product.name, option.name),
            description: product.brief_description.clone(),
            images: product.images.iter().map(|image| state.access_url(&image.file_path)).collect(),
            unit_amount: option.unit_amount,
            quantity: good.quantity,
        });
    }

    let first = goods
        .first()
        .and_then(|good| products.iter().find(|product| product.id == good.product_id))
        .ok_or_else(|| AppError::not_found("payment product not exist"))?;
    Ok((first.affiliation.creator.clone(), items))
}

/// Public checkout: answers the gateway's payment URL
pub async fn create_checkout_session(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<GatewayQuery>,
    ValidJson(form): ValidJson<CheckoutForm>,
) -> Result<ApiResponse<String>> {
    let (creator, good_list) = match (&form.goods, &form.temp_goods) {
        (Some(goods), _) if !goods.is_empty() => goods_line_items(&state, goods).await?,
        (_, Some(temp)) => {
            let event = state
                .db
                .events
                .find_by_id(temp.event_id)
                .await?
                .ok_or_else(|| AppError::not_found("event not exist"))?;
            let item = CheckoutLineItem {
                name: temp.name.clone(),
                description: form.consumer.clone(),
                images: vec![state.access_url(&event.background.file_path)],
                unit_amount: temp.unit_amount,
                quantity: 1,
            };
            (event.creator().to_string(), vec![item])
        }
        _ => return Err(AppError::not_found("goods and tempGoods must be provided at least one")),
    };

    let config = seller_configuration(&state, &creator).await?;
    let authorization = config
        .current_authorization(query.gateway)
        .ok_or_else(|| AppError::not_found("payment gateway not exist"))?;

    let client = &state.services.payment_client;
    let body = CheckoutSessionRequest::pay(client.currency(), good_list, &form.success_url, &form.failed_url);
    let session = client
        .create_checkout_session(
            query.gateway,
            authorization,
            &body,
            &state.settings.app.frontend_domain,
            &form.consumer,
        )
        .await
        .map_err(|e| {
            warn!(gateway = %query.gateway.key(), error = %e, "Checkout session request failed");
            e.unless_timeout(|_| AppError::operating_failed("checkout session create failed"))
        })?;

    session
        .get("url")
        .and_then(Value::as_str)
        .map(|url| ok(url.to_string()))
        .ok_or_else(|| AppError::operating_failed("checkout session create failed"))
}

#[derive(Debug, Deserialize)]
pub struct GatewayConfigurationForm {
    pub category: PaymentGateway,
    pub enabled: Option<bool>,
    pub env: Option<PaymentAuthorizationEnv>,
    pub authorization: Option<PaymentAuthorization>,
}

pub async fn configure_gateway(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<GatewayConfigurationForm>,
) -> Result<ApiResponse<String>> {
    let caller = auth.require(&[UserTitle::Admin, UserTitle::Organization])?;
    let title = form.category.display_name();

    if caller.title == UserTitle::Admin {
        let config = state
            .db
            .admin
            .find_configuration(&caller.email)
            .await?
            .ok_or_else(|| AppError::not_found("admin configuration not found"))?;
        let mut gateways = config.payment_gateway.0;
        let entry = gateways
            .get_mut(&form.category)
            .ok_or_else(|| AppError::forbidden("payment gateway category not found"))?;
        if let Some(enabled) = form.enabled {
            entry.enable = enabled;
        }
        let enabled = entry.enable;
        state.db.admin.update_gateways(config.id, &gateways).await?;

        log_admin_action(&caller.email, "configure_gateway", Some(form.category.key()), None);
        return Ok(ok(format!("{} enabled change to {} successfully", title, enabled)));
    }

    let config = state
        .db
        .organizations
        .find_configuration(&caller.email)
        .await?
        .ok_or_else(|| AppError::not_found("organization configuration not found"))?;
    let mut gateways = config.payment_gateway.0;
    let entry = gateways
        .get_mut(&form.category)
        .ok_or_else(|| AppError::forbidden("payment gateway category not found"))?;

    if let Some(enabled) = form.enabled {
        entry.enable = enabled;
    }
    if let Some(env) = form.env {
        match form.authorization {
            Some(authorization) => {
                let methods = verified_methods(&state, form.category, &authorization).await?;
                entry
                    .configuration
                    .insert(env, GatewayEnvConfiguration { methods, authorization });
            }
            None if !entry.configuration.contains_key(&env) => {
                return Err(AppError::forbidden("payment gateway configuration of target env not found"));
            }
            None => {}
        }
        entry.env = env;
    }
    state.db.organizations.update_gateways(config.id, &gateways).await?;

    log_user_action(&caller.email, "configure_gateway", Some(form.category.key()));
    Ok(ok(format!("{} configuration change successfully", title)))
}

#[derive(Debug, Serialize)]
pub struct GatewayMethod {
    pub key: String,
    pub name: String,
    pub available: bool,
    pub gateway: PaymentGateway,
}

pub async fn methods(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<GatewayQuery>,
) -> Result<ApiResponse<Vec<GatewayMethod>>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let authorization = caller_authorization(&state, caller, query.gateway).await?;

    let methods = state
        .services
        .payment_client
        .payment_methods(query.gateway, &authorization)
        .await
        .map_err(|e| e.unless_timeout(|e| AppError::operating_failed(e.to_string())))?;

    Ok(ok(methods
        .into_iter()
        .map(|method| GatewayMethod {
            key: method.key,
            name: method.name,
            available: method.available,
            gateway: query.gateway,
        })
        .collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_options_keys_by_value() {
        let raw = vec![
            r#"{"value":"s","name":"Small","unitAmount":1000}"#.to_string(),
            r#"{"value":"l","name":"Large","unitAmount":2000}"#.to_string(),
        ];
        let options = parse_options(&raw).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options["l"].unit_amount, 2000);
    }

    #[test]
    fn test_product_view_lists_options() {
        let raw = vec![
            r#"{"value":"s","name":"Small","unitAmount":1000}"#.to_string(),
            r#"{"value":"l","name":"Large","unitAmount":2000}"#.to_string(),
        ];
        let product = PaymentProduct {
            id: Uuid::new_v4(),
            name: "Charity T-shirt".to_string(),
            brief_description: "Cotton".to_string(),
            detailed_description: String::new(),
            images: sqlx::types::Json(vec![FileObject::new("payment-products/p/0.png", "image/png")]),
            stocks: 5,
            options: sqlx::types::Json(parse_options(&raw).unwrap()),
            affiliation: sqlx::types::Json(ProductAffiliation {
                creator: "org@example.com".to_string(),
                bind_id: None,
                bind_type: None,
            }),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let view = ProductView::with_urls(&product, |path| format!("https://cdn.example.com/{}", path));
        let value = serde_json::to_value(&view).unwrap();

        let options = value["options"].as_array().expect("options array");
        assert_eq!(options.len(), 2);
        assert_eq!(options[0]["value"], "l");
        assert_eq!(options[1]["unitAmount"], 1000);
        assert_eq!(value["unitAmountRange"]["min"], 1000);
        assert_eq!(value["images"][0], "https://cdn.example.com/payment-products/p/0.png");
    }

    #[test]
    fn test_parse_options_rejects_bad_json() {
        let raw = vec!["{not json".to_string()];
        assert_matches!(parse_options(&raw), Err(AppError::IllegalParameters(_)));
    }

    #[test]
    fn test_ensure_images_names_the_bad_file() {
        let good = UploadedFile {
            field: "images".into(),
            file_name: "a.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1],
        };
        let bad = UploadedFile {
            file_name: "b.gif".into(),
            content_type: "image/gif".into(),
            ..good.clone()
        };
        assert!(ensure_images(&[&good]).is_ok());
        match ensure_images(&[&good, &bad]) {
            Err(AppError::OperatingFailed(data)) => assert_eq!(data, "b.gif upload image failed"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
