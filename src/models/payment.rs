use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::nullable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
    Pending,
    Refunded,
}

/// One row of `payment_history`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub membership_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub invoice_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: Payment,
    pub user_email: Option<String>,
    pub user_full_name: Option<String>,
    pub application_name: Option<String>,
    pub application_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilters {
    pub user_id: Option<Uuid>,
    pub membership_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub membership_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub invoice_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePaymentRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub membership_id: Option<Option<Uuid>>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub payment_method: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub transaction_id: Option<Option<String>>,
    pub status: Option<PaymentStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub invoice_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub paid_at: Option<Option<DateTime<Utc>>>,
}
