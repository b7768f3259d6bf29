//! Request extractors that report malformed input as validation errors
//!
//! axum's own rejections answer in plain text; these wrappers turn them into
//! the envelope with code 2001 and HTTP 422.

use std::collections::HashMap;

use axum::extract::{FromRequest, FromRequestParts, Multipart, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::is_valid_email;

/// `"<loc> → <field>: <msg>"`, with the field taken from serde's message when present
pub fn validation_message(loc: &str, message: &str) -> String {
    let field = message
        .split('`')
        .nth(1)
        .filter(|_| message.contains("field `"))
        .unwrap_or("__root__");
    format!("{} → {}: {}", loc, field, message)
}

pub fn invalid(loc: &str, field: &str, message: &str) -> AppError {
    AppError::Validation(vec![format!("{} → {}: {}", loc, field, message)])
}

/// Reject anything that is not an email address
pub fn ensure_email(loc: &str, field: &str, value: &str) -> Result<()> {
    if is_valid_email(value) {
        Ok(())
    } else {
        Err(invalid(loc, field, "value is not a valid email address"))
    }
}

/// JSON body
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::Validation(vec![validation_message(
                "body",
                &rejection.body_text(),
            )])),
        }
    }
}

/// Query string
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::Validation(vec![validation_message(
                "query",
                &rejection.body_text(),
            )])),
        }
    }
}

/// File part of a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Fully read multipart body
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    texts: HashMap<String, Vec<String>>,
    files: Vec<UploadedFile>,
}

impl MultipartForm {
    pub async fn collect(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                    form.files.push(UploadedFile {
                        field: name,
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                None => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.texts.entry(name).or_default().push(value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Non-empty text field or a validation error
    pub fn required(&self, name: &str) -> Result<String> {
        self.text(name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| invalid("body", name, "field required"))
    }

    pub fn texts(&self, name: &str) -> &[String] {
        self.texts.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|file| file.field == name)
    }

    pub fn files<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files.iter().filter(move |file| file.field == name)
    }

    pub fn required_file(&self, name: &str) -> Result<&UploadedFile> {
        self.file(name).ok_or_else(|| invalid("body", name, "field required"))
    }
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(vec![validation_message("body", &error.body_text())])
}

impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(vec![validation_message("body", &rejection.body_text())]))?;
        Self::collect(multipart).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_validation_message_names_field() {
        assert_eq!(
            validation_message("body", "missing field `email` at line 1 column 2"),
            "body → email: missing field `email` at line 1 column 2"
        );
        assert_eq!(
            validation_message("query", "Failed to deserialize query string"),
            "query → __root__: Failed to deserialize query string"
        );
    }

    #[test]
    fn test_ensure_email() {
        assert!(ensure_email("body", "email", "a@example.com").is_ok());
        assert_matches!(ensure_email("body", "email", "nope"), Err(AppError::Validation(_)));
    }

    #[test]
    fn test_multipart_form_accessors() {
        let mut form = MultipartForm::default();
        form.texts.insert("name".into(), vec!["Shop".into()]);
        form.texts.insert("options".into(), vec!["{}".into(), "{}".into()]);
        form.texts.insert("empty".into(), vec![String::new()]);
        form.files.push(UploadedFile {
            field: "images".into(),
            file_name: "a.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1],
        });

        assert_eq!(form.text("name"), Some("Shop"));
        assert_eq!(form.texts("options").len(), 2);
        assert!(form.texts("missing").is_empty());
        assert_matches!(form.required("empty"), Err(AppError::Validation(_)));
        assert_eq!(form.files("images").count(), 1);
        assert!(form.file("avatar").is_none());
        assert!(form.required_file("images").is_ok());
    }
}
