use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::application::default_true;
use super::nullable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Alipay,
    Wechat,
    Stripe,
    Manual,
    /// EPay-compatible gateways.
    Epay,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentConfig {
    pub id: Uuid,
    pub application_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub is_sandbox: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentConfigRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment_config: PaymentConfig,
    pub application_name: Option<String>,
    pub application_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentConfigFilters {
    pub application_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentConfigRequest {
    pub application_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub config: serde_json::Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_sandbox: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePaymentConfigRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub application_id: Option<Option<Uuid>>,
    pub payment_method: Option<PaymentMethod>,
    pub config: Option<serde_json::Value>,
    pub is_active: Option<bool>,
    pub is_sandbox: Option<bool>,
}
