//! Mock upstream servers for testing
//!
//! wiremock stand-ins for the integration (mail) API and the payment gateway
//! aggregator.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test-integration-key";

/// Mock integration API server
pub struct IntegrationMockServer {
    pub server: MockServer,
}

impl IntegrationMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Accept every mail sent with the test API key
    pub async fn mock_send_mail(&self) {
        Mock::given(method("POST"))
            .and(path("/mail/send"))
            .and(header("x-api-key", TEST_API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_send_verification_code(&self) {
        Mock::given(method("POST"))
            .and(path("/mail/verification-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&self.server)
            .await;
    }

    /// Answer code verification with the verified email, or a 400 when `email` is `None`
    pub async fn mock_verify_code(&self, email: Option<&str>) {
        let response = match email {
            Some(email) => ResponseTemplate::new(200).set_body_json(json!({ "email": email })),
            None => ResponseTemplate::new(400).set_body_json(json!({ "detail": "code mismatch" })),
        };
        Mock::given(method("POST"))
            .and(path("/mail/verification-code/verify"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Bodies of every mail delivered so far
    pub async fn sent_mails(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == "/mail/send")
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}

/// Mock payment gateway aggregator
pub struct PaymentMockServer {
    pub server: MockServer,
}

impl PaymentMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    pub async fn mock_payment_methods(&self, gateway: &str, methods: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/payment-methods", gateway)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "methods": methods })))
            .mount(&self.server)
            .await;
    }

    /// Answer payment methods only after `delay`
    pub async fn mock_slow_payment_methods(&self, gateway: &str, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/payment-methods", gateway)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "methods": [] }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mock_rejected_credentials(&self, gateway: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/payment-methods", gateway)))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "invalid key" })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_transactions(&self, gateway: &str, records: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/transactions", gateway)))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_create_checkout_session(&self, gateway: &str, session: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/checkout-sessions", gateway)))
            .respond_with(ResponseTemplate::new(200).set_body_json(session))
            .mount(&self.server)
            .await;
    }
}
