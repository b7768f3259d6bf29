//! Response envelope
//!
//! Every endpoint except `/status` answers with the same
//! `{category, code, message, data}` document. Success helpers live here,
//! failures are produced by [`crate::utils::errors::AppError`].

use std::fmt;
use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

static CATEGORY: OnceLock<String> = OnceLock::new();

const DEFAULT_CATEGORY: &str = "00";

/// Set the platform identifier reported in every envelope.
///
/// Only the first call has an effect.
pub fn init_category(app_no: &str) {
    let _ = CATEGORY.set(app_no.to_string());
}

/// Platform identifier reported in every envelope
pub fn category() -> &'static str {
    CATEGORY.get().map(String::as_str).unwrap_or(DEFAULT_CATEGORY)
}

/// Custom response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCode {
    #[serde(rename = "0000")]
    OperatingSuccessfully,
    #[serde(rename = "0001")]
    EmptyContent,
    #[serde(rename = "0002")]
    NothingChanged,
    #[serde(rename = "2000")]
    OperatingFailed,
    #[serde(rename = "2001")]
    IllegalParameters,
    #[serde(rename = "2002")]
    Unauthorized,
    #[serde(rename = "2003")]
    Forbidden,
    #[serde(rename = "2004")]
    NotFound,
    #[serde(rename = "2005")]
    MethodNotAllowed,
    #[serde(rename = "2006")]
    RequestTimeout,
    #[serde(rename = "3000")]
    SystemError,
}

impl ResponseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::OperatingSuccessfully => "0000",
            ResponseCode::EmptyContent => "0001",
            ResponseCode::NothingChanged => "0002",
            ResponseCode::OperatingFailed => "2000",
            ResponseCode::IllegalParameters => "2001",
            ResponseCode::Unauthorized => "2002",
            ResponseCode::Forbidden => "2003",
            ResponseCode::NotFound => "2004",
            ResponseCode::MethodNotAllowed => "2005",
            ResponseCode::RequestTimeout => "2006",
            ResponseCode::SystemError => "3000",
        }
    }

    /// Standard message paired with the code
    pub fn message(&self) -> &'static str {
        match self {
            ResponseCode::OperatingSuccessfully => "Operating successfully",
            ResponseCode::EmptyContent => "Empty Content",
            ResponseCode::NothingChanged => "Nothing Changed",
            ResponseCode::OperatingFailed => "Operating Failed",
            ResponseCode::IllegalParameters => "Illegal Parameters",
            ResponseCode::Unauthorized => "Unauthorized",
            ResponseCode::Forbidden => "Forbidden",
            ResponseCode::NotFound => "Not Found",
            ResponseCode::MethodNotAllowed => "Method Not Allowed",
            ResponseCode::RequestTimeout => "Request Timeout",
            ResponseCode::SystemError => "System Error",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub category: String,
    pub code: ResponseCode,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_code(code: ResponseCode, data: T) -> Self {
        Self {
            category: category().to_string(),
            code,
            message: code.message().to_string(),
            data,
        }
    }

    pub fn success(data: T) -> Self {
        Self::with_code(ResponseCode::OperatingSuccessfully, data)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Shorthand for a successful envelope
pub fn ok<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::success(data)
}

/// Paginated list payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination<T> {
    pub total: i64,
    pub page_no: i64,
    pub page_size: i64,
    pub has_more: bool,
    pub items: Vec<T>,
}

impl<T> Pagination<T> {
    pub fn new(items: Vec<T>, total: i64, page: PageQuery) -> Self {
        Self {
            total,
            page_no: page.page_no,
            page_size: page.page_size,
            has_more: page.page_no.saturating_mul(page.page_size) < total,
            items,
        }
    }
}

/// `pageNo`/`pageSize` query parameters, 1-based
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default = "default_page_no")]
    pub page_no: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page_no() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

const MAX_PAGE_SIZE: i64 = 100;
const MAX_PAGE_NO: i64 = i64::MAX / MAX_PAGE_SIZE;

impl PageQuery {
    pub fn normalized(self) -> Self {
        Self {
            page_no: self.page_no.clamp(1, MAX_PAGE_NO),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        self.page_no.saturating_sub(1).saturating_mul(self.page_size)
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page_no: default_page_no(),
            page_size: default_page_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_serializes_as_string() {
        let value = serde_json::to_value(ResponseCode::NotFound).unwrap();
        assert_eq!(value, json!("2004"));
        assert_eq!(ResponseCode::NotFound.message(), "Not Found");
    }

    #[test]
    fn test_success_envelope_shape() {
        let response = ApiResponse::success("registered successfully");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["code"], json!("0000"));
        assert_eq!(value["message"], json!("Operating successfully"));
        assert_eq!(value["data"], json!("registered successfully"));
        assert!(value["category"].is_string());
    }

    #[test]
    fn test_pagination_has_more() {
        let page = PageQuery { page_no: 1, page_size: 2 };
        let pagination = Pagination::new(vec![1, 2], 3, page);
        assert!(pagination.has_more);

        let page = PageQuery { page_no: 2, page_size: 2 };
        let pagination = Pagination::new(vec![3], 3, page);
        assert!(!pagination.has_more);

        let value = serde_json::to_value(&pagination).unwrap();
        assert_eq!(value["pageNo"], json!(2));
        assert_eq!(value["hasMore"], json!(false));
    }

    #[test]
    fn test_page_query_normalization() {
        let page = PageQuery { page_no: 0, page_size: 1000 }.normalized();
        assert_eq!(page.page_no, 1);
        assert_eq!(page.page_size, 100);
        assert_eq!(page.offset(), 0);

        let page = PageQuery { page_no: 3, page_size: 10 };
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn test_huge_page_no_does_not_overflow() {
        let page = PageQuery { page_no: i64::MAX / 2, page_size: 100 }.normalized();
        assert_eq!(page.page_no, i64::MAX / 100);
        assert!(page.offset() > 0);

        let pagination = Pagination::new(Vec::<i64>::new(), 5, PageQuery { page_no: i64::MAX, page_size: 100 });
        assert!(!pagination.has_more);

        let raw = PageQuery { page_no: i64::MIN, page_size: i64::MAX };
        assert_eq!(raw.normalized().offset(), 0);
    }
}
