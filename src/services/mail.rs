//! Integration API client and mail templates
//!
//! Mail delivery and email verification codes are delegated to the
//! integration API. Notification bodies are rendered from a small template
//! registry using `{placeholder}` substitution.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::IntegrationConfig;
use crate::services::http::{build_client, send_with_retry, RetryPolicy};
use crate::utils::errors::{AppError, Result};

pub const ACCOUNT_STATUS_CHANGED: &str = "account_status_changed";
pub const EVENT_STATUS_CHANGED: &str = "event_status_changed";
pub const CERTIFICATION_READY: &str = "organization_certification_ready";

/// Mail template with `{placeholder}` markers in subject and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailTemplate {
    pub key: String,
    pub subject: String,
    pub body: String,
}

/// Rendered mail ready to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMail {
    pub subject: String,
    pub html: String,
}

impl MailTemplate {
    pub fn new(key: &str, subject: &str, body: &str) -> Self {
        Self {
            key: key.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    pub fn render(&self, parameters: &HashMap<&str, String>) -> RenderedMail {
        RenderedMail {
            subject: substitute(&self.subject, parameters, str::to_string),
            html: substitute(&self.body, parameters, escape_html),
        }
    }
}

fn substitute(template: &str, parameters: &HashMap<&str, String>, encode: fn(&str) -> String) -> String {
    let mut formatted = template.to_string();
    for (key, value) in parameters {
        let placeholder = format!("{{{}}}", key);
        formatted = formatted.replace(&placeholder, &encode(value));
    }
    formatted
}

/// Escape text placed inside an HTML body
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Registry of the notification templates
#[derive(Debug, Clone)]
pub struct MailTemplates {
    templates: HashMap<String, MailTemplate>,
}

impl Default for MailTemplates {
    fn default() -> Self {
        let mut templates = HashMap::new();

        templates.insert(
            ACCOUNT_STATUS_CHANGED.to_string(),
            MailTemplate::new(
                ACCOUNT_STATUS_CHANGED,
                "Account Status Changed",
                "<p>Dear {email},</p>\
                 <p>Your account status has been changed to <b>{status}</b> by {affiliation}.</p>\
                 <p>Reason: {reason}</p>",
            ),
        );
        templates.insert(
            EVENT_STATUS_CHANGED.to_string(),
            MailTemplate::new(
                EVENT_STATUS_CHANGED,
                "{event_name} Status Changed",
                "<p>Dear {email},</p>\
                 <p>The {change_field} of your event <b>{event_name}</b> has been changed by {affiliation}.</p>\
                 <p>Remark: {reason}</p>",
            ),
        );
        templates.insert(
            CERTIFICATION_READY.to_string(),
            MailTemplate::new(
                CERTIFICATION_READY,
                "Organization Certification Ready",
                "<p>Dear {affiliation},</p>\
                 <p>The organization <b>{name}</b> has uploaded all certification documents \
                 and is waiting for your approval.</p>",
            ),
        );

        Self { templates }
    }
}

impl MailTemplates {
    pub fn get(&self, key: &str) -> Option<&MailTemplate> {
        self.templates.get(key)
    }

    pub fn add(&mut self, template: MailTemplate) {
        self.templates.insert(template.key.clone(), template);
    }

    pub fn keys(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn render(&self, key: &str, parameters: &HashMap<&str, String>) -> Result<RenderedMail> {
        self.get(key)
            .map(|template| template.render(parameters))
            .ok_or_else(|| AppError::Config(format!("Mail template not found: {}", key)))
    }
}

#[derive(Debug, Serialize)]
struct SendMailBody<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Serialize)]
struct VerificationBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    email: Option<String>,
}

/// Client for the integration API
#[derive(Debug, Clone)]
pub struct IntegrationClient {
    client: reqwest::Client,
    config: IntegrationConfig,
    policy: RetryPolicy,
    templates: Arc<MailTemplates>,
}

impl IntegrationClient {
    pub fn new(config: IntegrationConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            policy: RetryPolicy::with_timeout(config.timeout_seconds),
            config,
            templates: Arc::new(MailTemplates::default()),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("x-api-key", &self.config.api_key)
            .json(body)
    }

    /// Deliver an HTML mail
    pub async fn send_mail(&self, to: &str, subject: &str, html: &str) -> Result<bool> {
        let request = self.post("/mail/send", &SendMailBody { to, subject, html });
        send_with_retry(request, &self.policy).await?;
        info!(to = %to, subject = %subject, "Mail sent");
        Ok(true)
    }

    /// Render a registered template and deliver it
    pub async fn send_template(&self, to: &str, key: &str, parameters: &HashMap<&str, String>) -> Result<bool> {
        let mail = self.templates.render(key, parameters)?;
        self.send_mail(to, &mail.subject, &mail.html).await
    }

    /// Send a template, logging instead of failing when delivery breaks
    pub async fn notify(&self, to: &str, key: &str, parameters: &HashMap<&str, String>) {
        if let Err(e) = self.send_template(to, key, parameters).await {
            warn!(to = %to, template = %key, error = %e, "Notification mail not delivered");
        }
    }

    /// Ask the integration API to mail a verification code
    pub async fn send_verification_code(&self, email: &str) -> Result<bool> {
        let request = self.post("/mail/verification-code", &VerificationBody { email, code: None });
        send_with_retry(request, &self.policy).await?;
        debug!(email = %email, "Verification code requested");
        Ok(true)
    }

    /// The verified email, or `None` when the code does not match
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<Option<String>> {
        let request = self.post(
            "/mail/verification-code/verify",
            &VerificationBody {
                email,
                code: Some(code),
            },
        );

        let response = match send_with_retry(request, &self.policy).await {
            Ok(response) => response,
            Err(AppError::Http(e)) if e.status().is_some_and(|s| s.is_client_error()) => {
                debug!(email = %email, status = ?e.status(), "Verification code rejected");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body: VerifyResponse = response.json().await?;
        Ok(body.email)
    }

    /// Whether `code` verifies `email`
    pub async fn code_matches(&self, email: &str, code: &str) -> Result<bool> {
        Ok(self
            .verify_code(email, code)
            .await?
            .is_some_and(|verified| verified.eq_ignore_ascii_case(email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let templates = MailTemplates::default();
        let params = HashMap::from([
            ("email", "org@example.com".to_string()),
            ("affiliation", "admin@example.com".to_string()),
            ("status", "Disabled".to_string()),
            ("reason", "expired licence".to_string()),
        ]);

        let mail = templates.render(ACCOUNT_STATUS_CHANGED, &params).unwrap();
        assert_eq!(mail.subject, "Account Status Changed");
        assert!(mail.html.contains("<b>Disabled</b>"));
        assert!(mail.html.contains("expired licence"));
        assert!(!mail.html.contains('{'));
    }

    #[test]
    fn test_parameters_are_escaped_in_html_only() {
        let templates = MailTemplates::default();
        let params = HashMap::from([
            ("event_name", "Fish & Chips".to_string()),
            ("reason", "<script>alert(\"x\")</script>".to_string()),
        ]);

        let mail = templates.render(EVENT_STATUS_CHANGED, &params).unwrap();
        assert_eq!(mail.subject, "Fish & Chips Status Changed");
        assert!(mail.html.contains("<b>Fish &amp; Chips</b>"));
        assert!(mail.html.contains("&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"));
        assert!(!mail.html.contains("<script>"));
    }

    #[test]
    fn test_event_subject_uses_name() {
        let templates = MailTemplates::default();
        let params = HashMap::from([("event_name", "Charity Run".to_string())]);
        let mail = templates.render(EVENT_STATUS_CHANGED, &params).unwrap();
        assert_eq!(mail.subject, "Charity Run Status Changed");
    }

    #[test]
    fn test_template_registry() {
        let mut templates = MailTemplates::default();
        assert_eq!(templates.keys().len(), 3);
        assert!(templates.render("missing", &HashMap::new()).is_err());

        templates.add(MailTemplate::new("custom", "Hi {name}", "<p>{name}</p>"));
        let mail = templates
            .render("custom", &HashMap::from([("name", "Ann".to_string())]))
            .unwrap();
        assert_eq!(mail.subject, "Hi Ann");
        assert_eq!(mail.html, "<p>Ann</p>");
    }
}
