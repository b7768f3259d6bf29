//! HTTP application assembly
//!
//! Builds the full router: every handler module, the envelope answers for
//! unknown routes and methods, and the tower-http stack.

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{middleware, Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::log_requests;
use crate::response::{ApiResponse, ResponseCode};
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let app_config = state.settings.app.clone();
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    handlers::routes()
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn(log_requests))
        .layer(RequestBodyLimitLayer::new(app_config.body_limit_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(app_config.request_timeout_seconds),
        ))
        .layer(middleware::map_response(envelope_timeout))
        .layer(cors_layer(&app_config))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

/// Allow the configured frontend origin, or any origin when it does not parse
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    match HeaderValue::from_str(config.frontend_domain.trim_end_matches('/')) {
        Ok(origin) if config.env != "development" => base.allow_origin(AllowOrigin::exact(origin)),
        Ok(_) => base.allow_origin(Any),
        Err(_) => {
            warn!(frontend_domain = %config.frontend_domain, "Invalid frontend origin, allowing any origin");
            base.allow_origin(Any)
        }
    }
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::with_code(ResponseCode::NotFound, "resource not found")),
    )
        .into_response()
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ApiResponse::with_code(ResponseCode::MethodNotAllowed, "method not allowed")),
    )
        .into_response()
}

/// Give the bare 408 produced by the timeout layer an envelope body
async fn envelope_timeout(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT || response.headers().contains_key(header::CONTENT_TYPE) {
        return response;
    }
    (
        StatusCode::REQUEST_TIMEOUT,
        Json(ApiResponse::with_code(ResponseCode::RequestTimeout, "request timeout")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_fallbacks_use_envelope_codes() {
        let response = not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_slow_handler_times_out_with_envelope() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "done"
                }),
            )
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_millis(50),
            ))
            .layer(middleware::map_response(envelope_timeout));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "2006");
        assert_eq!(body["data"], "request timeout");
    }

    #[tokio::test]
    async fn test_other_responses_pass_through() {
        let response = envelope_timeout(not_found().await).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
