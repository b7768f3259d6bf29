//! Request logging middleware
//!
//! Emits one structured event per request with the route, the outcome and
//! the processing time. Health checks on `/status` are not logged.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

const SKIPPED_PATHS: &[&str] = &["/status"];

/// Whether requests to `path` are logged
pub fn should_log(path: &str) -> bool {
    !SKIPPED_PATHS.contains(&path)
}

/// Log each request once it has been answered
pub async fn log_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if !should_log(&path) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let process_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    if response.status().is_server_error() {
        warn!(
            target: "api_requests",
            path = %path,
            method = %method,
            query = %query,
            status,
            process_time_ms,
            "Request completed"
        );
    } else {
        info!(
            target: "api_requests",
            path = %path,
            method = %method,
            query = %query,
            status,
            process_time_ms,
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_check_is_skipped() {
        assert!(!should_log("/status"));
        assert!(should_log("/status/extra"));
        assert!(should_log("/common/login"));
    }
}
