//! Integration API and payment aggregator clients against wiremock

mod helpers;

use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use helpers::*;
use serde_json::json;

use frsaas::config::{IntegrationConfig, PaymentConfig};
use frsaas::models::payment::{PaymentAuthorization, PaymentGateway, PaymentTransactionStatus};
use frsaas::services::mail::ACCOUNT_STATUS_CHANGED;
use frsaas::services::{CheckoutLineItem, CheckoutSessionRequest, IntegrationClient, PaymentGatewayClient, RetryPolicy};
use frsaas::handlers::organization::verified_methods;
use frsaas::{AppError, ResponseCode};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 2,
        timeout: Duration::from_secs(2),
        backoff: Duration::from_millis(10),
    }
}

fn integration_client(server: &IntegrationMockServer) -> IntegrationClient {
    IntegrationClient::new(IntegrationConfig {
        base_url: server.base_url(),
        api_key: TEST_API_KEY.to_string(),
        timeout_seconds: 2,
    })
    .unwrap()
    .with_policy(fast_policy())
}

fn payment_client(server: &PaymentMockServer) -> PaymentGatewayClient {
    PaymentGatewayClient::new(PaymentConfig {
        base_url: server.base_url(),
        timeout_seconds: 2,
        currency: "HKD".to_string(),
    })
    .unwrap()
    .with_policy(fast_policy())
}

fn authorization() -> PaymentAuthorization {
    PaymentAuthorization {
        public_key: "pk_test".to_string(),
        secret_key: "sk_test".to_string(),
    }
}

#[tokio::test]
async fn test_verify_code_returns_verified_email() {
    let server = IntegrationMockServer::new().await;
    server.mock_verify_code(Some("org@example.com")).await;
    let client = integration_client(&server);

    let verified = client.verify_code("org@example.com", "123456").await.unwrap();
    assert_eq!(verified.as_deref(), Some("org@example.com"));
    assert!(client.code_matches("ORG@example.com", "123456").await.unwrap());
    assert!(!client.code_matches("other@example.com", "123456").await.unwrap());
}

#[tokio::test]
async fn test_rejected_code_is_not_an_error() {
    let server = IntegrationMockServer::new().await;
    server.mock_verify_code(None).await;
    let client = integration_client(&server);

    assert_eq!(client.verify_code("org@example.com", "000000").await.unwrap(), None);
    assert!(!client.code_matches("org@example.com", "000000").await.unwrap());
}

#[tokio::test]
async fn test_template_mail_is_rendered_and_sent() {
    let server = IntegrationMockServer::new().await;
    server.mock_send_mail().await;
    let client = integration_client(&server);

    let params = HashMap::from([
        ("email", "org@example.com".to_string()),
        ("affiliation", "admin@example.com".to_string()),
        ("status", "Disabled".to_string()),
        ("reason", "licence expired".to_string()),
    ]);
    assert!(client
        .send_template("org@example.com", ACCOUNT_STATUS_CHANGED, &params)
        .await
        .unwrap());

    let mails = server.sent_mails().await;
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0]["to"], "org@example.com");
    assert!(mails[0]["html"].as_str().unwrap().contains("licence expired"));
}

#[tokio::test]
async fn test_notify_swallows_delivery_failures() {
    let server = IntegrationMockServer::new().await;
    let client = integration_client(&server);

    // No mock mounted: wiremock answers 404
    client.notify("org@example.com", ACCOUNT_STATUS_CHANGED, &HashMap::new()).await;

    let mails = server.sent_mails().await;
    assert_eq!(mails.len(), 1);
    assert!(mails[0]["html"].as_str().unwrap().contains("{reason}"));
}

#[tokio::test]
async fn test_payment_methods_with_valid_credentials() {
    let server = PaymentMockServer::new().await;
    server
        .mock_payment_methods(
            "stripe",
            json!([
                { "key": "card", "name": "Card", "available": true },
                { "key": "alipay", "name": "Alipay", "available": true }
            ]),
        )
        .await;
    let client = payment_client(&server);

    let methods = client
        .payment_methods(PaymentGateway::Stripe, &authorization())
        .await
        .unwrap();

    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0].key, "card");

    let requests = server.server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers["x-pg-secret-key"], "sk_test");
    assert_eq!(requests[0].url.query(), Some("available=true"));
}

#[tokio::test]
async fn test_rejected_credentials_are_an_http_error() {
    let server = PaymentMockServer::new().await;
    server.mock_rejected_credentials("payme").await;
    let client = payment_client(&server);

    let result = client.payment_methods(PaymentGateway::Payme, &authorization()).await;

    assert_matches!(result, Err(AppError::Http(_)));
}

#[tokio::test]
async fn test_gateway_timeout_is_reported_as_request_timeout() {
    let server = PaymentMockServer::new().await;
    server
        .mock_slow_payment_methods("stripe", Duration::from_secs(3))
        .await;
    let app = TestApp::with_settings(|settings| {
        settings.payment.base_url = server.base_url();
        settings.payment.timeout_seconds = 1;
    })
    .await;

    let err = verified_methods(&app.state, PaymentGateway::Stripe, &authorization())
        .await
        .unwrap_err();

    assert_matches!(&err, AppError::RequestTimeout(_));
    assert_eq!(err.response_code(), ResponseCode::RequestTimeout);
    assert_eq!(err.response_code().as_str(), "2006");
}

#[tokio::test]
async fn test_rejected_gateway_credentials_are_forbidden() {
    let server = PaymentMockServer::new().await;
    server.mock_rejected_credentials("stripe").await;
    let app = TestApp::with_settings(|settings| {
        settings.payment.base_url = server.base_url();
    })
    .await;

    let err = verified_methods(&app.state, PaymentGateway::Stripe, &authorization())
        .await
        .unwrap_err();

    assert_eq!(err.response_code(), ResponseCode::Forbidden);
}

#[tokio::test]
async fn test_transactions_filtered_by_status() {
    let server = PaymentMockServer::new().await;
    server
        .mock_transactions(
            "stripe",
            json!([{ "id": "tx_1", "amount": 50.0, "status": "succeeded", "session_id": "cs_1" }]),
        )
        .await;
    let client = payment_client(&server);

    let records = client
        .transactions(
            PaymentGateway::Stripe,
            &authorization(),
            &[PaymentTransactionStatus::Succeeded, PaymentTransactionStatus::Refunded],
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    let requests = server.server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("status=succeeded&status=refunded"));
}

#[tokio::test]
async fn test_create_checkout_session_sends_consumer_headers() {
    let server = PaymentMockServer::new().await;
    server
        .mock_create_checkout_session("stripe", json!({ "id": "cs_1", "url": "https://pay.example.com/cs_1" }))
        .await;
    let client = payment_client(&server);

    let body = CheckoutSessionRequest::pay(
        client.currency(),
        vec![CheckoutLineItem {
            name: "Charity T-shirt - Large".to_string(),
            description: "Cotton tee".to_string(),
            images: Vec::new(),
            unit_amount: 8000,
            quantity: 2,
        }],
        "https://shop.example.com/success",
        "https://shop.example.com/failed",
    );
    let session = client
        .create_checkout_session(
            PaymentGateway::Stripe,
            &authorization(),
            &body,
            "https://shop.example.com",
            "buyer@example.com",
        )
        .await
        .unwrap();

    assert_eq!(session["url"], "https://pay.example.com/cs_1");
    let requests = server.server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers["x-pg-consumer"], "buyer@example.com");
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["currency"], "HKD");
    assert_eq!(sent["submitType"], "pay");
    assert_eq!(sent["goodList"][0]["unitAmount"], 8000);
}
