//! Payment gateway aggregator client
//!
//! The aggregator fronts every supported gateway behind one API keyed by
//! gateway name. Credentials of the organization travel as `x-pg-*` headers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::PaymentConfig;
use crate::models::payment::{PaymentAuthorization, PaymentGateway, PaymentMethod, PaymentTransactionStatus};
use crate::services::http::{build_client, send_with_retry, RetryPolicy};
use crate::utils::errors::Result;

/// One line of a checkout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLineItem {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Body of a checkout session creation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub order_id: String,
    pub currency: String,
    pub good_list: Vec<CheckoutLineItem>,
    pub submit_type: String,
    pub payment_method_types: Vec<String>,
    pub success_url: String,
    pub failed_url: String,
}

impl CheckoutSessionRequest {
    /// A pay-now session with a fresh order id
    pub fn pay(currency: &str, good_list: Vec<CheckoutLineItem>, success_url: &str, failed_url: &str) -> Self {
        Self {
            order_id: uuid::Uuid::new_v4().to_string(),
            currency: currency.to_string(),
            good_list,
            submit_type: "pay".to_string(),
            payment_method_types: Vec::new(),
            success_url: success_url.to_string(),
            failed_url: failed_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MethodList {
    #[serde(default)]
    methods: Vec<PaymentMethod>,
}

/// Transaction as reported back to organizations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub amount: f64,
    pub attribution: String,
    pub created_at: String,
    pub currency: String,
    pub gateway: Option<PaymentGateway>,
    pub metadata: Value,
    pub session_id: String,
    pub status: Option<PaymentTransactionStatus>,
    pub updated_at: String,
}

impl TransactionRecord {
    /// Map a raw aggregator record, tolerating missing fields
    pub fn from_value(record: &Value) -> Self {
        let text = |key: &str| record.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        Self {
            id: text("id"),
            amount: record.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
            attribution: text("attribution"),
            created_at: text("createdAt"),
            currency: text("currency"),
            gateway: record
                .get("gateway")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            metadata: record.get("metadata").cloned().unwrap_or_else(|| Value::Object(Default::default())),
            session_id: text("session_id"),
            status: record
                .get("status")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            updated_at: text("updatedAt"),
        }
    }
}

/// Client for the payment gateway aggregator
#[derive(Debug, Clone)]
pub struct PaymentGatewayClient {
    client: reqwest::Client,
    config: PaymentConfig,
    policy: RetryPolicy,
}

impl PaymentGatewayClient {
    pub fn new(config: PaymentConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            policy: RetryPolicy::with_timeout(config.timeout_seconds),
            config,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Settlement currency for new sessions
    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    fn request(
        &self,
        method: reqwest::Method,
        gateway: PaymentGateway,
        path: &str,
        authorization: &PaymentAuthorization,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/{}{}", self.config.base_url.trim_end_matches('/'), gateway.key(), path);
        self.client
            .request(method, url)
            .header("x-pg-public-key", &authorization.public_key)
            .header("x-pg-secret-key", &authorization.secret_key)
    }

    /// Methods available with the given credentials
    pub async fn payment_methods(
        &self,
        gateway: PaymentGateway,
        authorization: &PaymentAuthorization,
    ) -> Result<Vec<PaymentMethod>> {
        let request = self
            .request(reqwest::Method::GET, gateway, "/payment-methods", authorization)
            .query(&[("available", "true")]);
        let list: MethodList = send_with_retry(request, &self.policy).await?.json().await?;
        debug!(gateway = %gateway.key(), count = list.methods.len(), "Payment methods fetched");
        Ok(list.methods)
    }

    /// Raw transaction records, optionally filtered by status
    pub async fn transactions(
        &self,
        gateway: PaymentGateway,
        authorization: &PaymentAuthorization,
        statuses: &[PaymentTransactionStatus],
    ) -> Result<Vec<Value>> {
        let query: Vec<(&str, &str)> = statuses.iter().map(|s| ("status", s.as_str())).collect();
        let request = self
            .request(reqwest::Method::GET, gateway, "/transactions", authorization)
            .query(&query);
        Ok(send_with_retry(request, &self.policy).await?.json().await?)
    }

    pub async fn checkout_session(
        &self,
        gateway: PaymentGateway,
        authorization: &PaymentAuthorization,
        session_id: &str,
    ) -> Result<Value> {
        let path = format!("/checkout-sessions/{}", session_id);
        let request = self.request(reqwest::Method::GET, gateway, &path, authorization);
        Ok(send_with_retry(request, &self.policy).await?.json().await?)
    }

    /// Create a checkout session; the response carries the payment `url`
    pub async fn create_checkout_session(
        &self,
        gateway: PaymentGateway,
        authorization: &PaymentAuthorization,
        body: &CheckoutSessionRequest,
        referer: &str,
        consumer: &str,
    ) -> Result<Value> {
        let request = self
            .request(reqwest::Method::POST, gateway, "/checkout-sessions", authorization)
            .header("x-pg-referer", referer)
            .header("x-pg-consumer", consumer)
            .json(body);
        let session: Value = send_with_retry(request, &self.policy).await?.json().await?;
        info!(gateway = %gateway.key(), order_id = %body.order_id, "Checkout session created");
        Ok(session)
    }
}
