//! Payment model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::utils::helpers::title_case;

/// Gateways supported by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    Stripe,
    AlipayHk,
    WechatPay,
    Payme,
}

impl PaymentGateway {
    pub const ALL: [PaymentGateway; 4] = [
        PaymentGateway::Stripe,
        PaymentGateway::AlipayHk,
        PaymentGateway::WechatPay,
        PaymentGateway::Payme,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PaymentGateway::Stripe => "stripe",
            PaymentGateway::AlipayHk => "alipay_hk",
            PaymentGateway::WechatPay => "wechat_pay",
            PaymentGateway::Payme => "payme",
        }
    }

    pub fn display_name(&self) -> String {
        title_case(self.key())
    }

    pub fn logo_path(&self) -> String {
        format!("payment_gateway/logo/{}.png", self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAuthorizationEnv {
    Test,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTransactionStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
    Refunded,
}

impl PaymentTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTransactionStatus::Pending => "pending",
            PaymentTransactionStatus::Succeeded => "succeeded",
            PaymentTransactionStatus::Failed => "failed",
            PaymentTransactionStatus::Canceled => "canceled",
            PaymentTransactionStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductBindType {
    Event,
    ECommerce,
}

/// Credentials an organization holds at a gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub public_key: String,
    pub secret_key: String,
}

/// A payment method as reported by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    pub value: String,
    pub name: String,
    /// Minor currency units
    pub unit_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAffiliation {
    pub creator: String,
    #[serde(default)]
    pub bind_id: Option<String>,
    #[serde(default)]
    pub bind_type: Option<ProductBindType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentProduct {
    pub id: Uuid,
    pub name: String,
    pub brief_description: String,
    pub detailed_description: String,
    pub images: Json<Vec<FileObject>>,
    pub stocks: i32,
    pub options: Json<BTreeMap<String, ProductOption>>,
    pub affiliation: Json<ProductAffiliation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentProduct {
    /// (min, max) over the option unit amounts, (0, 0) without options
    pub fn unit_amount_range(&self) -> (i64, i64) {
        let amounts = self.options.values().map(|option| option.unit_amount);
        let min = amounts.clone().min();
        let max = amounts.max();
        match (min, max) {
            (Some(min), Some(max)) => (min, max),
            _ => (0, 0),
        }
    }

    pub fn is_event_bound(&self) -> bool {
        self.affiliation.bind_type == Some(ProductBindType::Event)
    }

    pub fn option(&self, key: &str) -> Option<&ProductOption> {
        self.options.get(key)
    }

    /// Options in key order, as clients receive them
    pub fn option_list(&self) -> Vec<ProductOption> {
        self.options.values().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct CreateProductRequest {
    pub name: String,
    pub brief_description: String,
    pub detailed_description: String,
    pub stocks: i32,
    pub options: BTreeMap<String, ProductOption>,
    pub affiliation: ProductAffiliation,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub brief_description: Option<String>,
    pub detailed_description: Option<String>,
    pub stocks: Option<i32>,
    pub options: Option<BTreeMap<String, ProductOption>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(options: &[(&str, i64)]) -> PaymentProduct {
        PaymentProduct {
            id: Uuid::new_v4(),
            name: "Charity T-shirt".to_string(),
            brief_description: "Cotton".to_string(),
            detailed_description: "Organic cotton".to_string(),
            images: Json(Vec::new()),
            stocks: 10,
            options: Json(
                options
                    .iter()
                    .map(|(key, amount)| {
                        (key.to_string(), ProductOption {
                            value: key.to_string(),
                            name: key.to_uppercase(),
                            unit_amount: *amount,
                        })
                    })
                    .collect(),
            ),
            affiliation: Json(ProductAffiliation {
                creator: "org@example.com".to_string(),
                bind_id: None,
                bind_type: Some(ProductBindType::ECommerce),
            }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_amount_range() {
        assert_eq!(product(&[]).unit_amount_range(), (0, 0));
        assert_eq!(product(&[("s", 1500)]).unit_amount_range(), (1500, 1500));
        assert_eq!(product(&[("s", 1500), ("m", 900), ("l", 2000)]).unit_amount_range(), (900, 2000));
    }

    #[test]
    fn test_option_list_follows_key_order() {
        let list = product(&[("m", 900), ("l", 2000), ("s", 1500)]).option_list();
        let values: Vec<_> = list.iter().map(|option| option.value.as_str()).collect();
        assert_eq!(values, ["l", "m", "s"]);
    }

    #[test]
    fn test_gateway_naming() {
        assert_eq!(PaymentGateway::AlipayHk.display_name(), "Alipay_Hk");
        assert_eq!(PaymentGateway::Stripe.logo_path(), "payment_gateway/logo/stripe.png");
        let key = serde_json::to_value(PaymentGateway::WechatPay).unwrap();
        assert_eq!(key, serde_json::json!("wechat_pay"));
    }

    #[test]
    fn test_option_wire_format() {
        let option: ProductOption =
            serde_json::from_str(r#"{"value":"s","name":"Small","unitAmount":1200}"#).unwrap();
        assert_eq!(option.unit_amount, 1200);
    }
}
