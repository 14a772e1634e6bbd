use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::application::default_true;
use super::nullable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MembershipPlan {
    pub id: Uuid,
    pub application_id: Option<Uuid>,
    /// Business key of the plan within its application, e.g. `pro_monthly`.
    pub plan_id: String,
    pub name: String,
    pub display_name: String,
    pub duration_days: i32,
    pub price: Decimal,
    pub currency: String,
    pub billing_cycle: Option<BillingCycle>,
    pub description: Option<String>,
    pub features: Option<serde_json::Value>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MembershipPlanRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub plan: MembershipPlan,
    pub application_name: Option<String>,
    pub application_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipPlanFilters {
    pub application_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMembershipPlanRequest {
    pub application_id: Option<Uuid>,
    pub plan_id: String,
    pub name: String,
    pub display_name: String,
    pub duration_days: i32,
    pub price: Decimal,
    pub currency: String,
    pub billing_cycle: Option<BillingCycle>,
    pub description: Option<String>,
    pub features: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMembershipPlanRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub application_id: Option<Option<Uuid>>,
    pub plan_id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub duration_days: Option<i32>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub billing_cycle: Option<Option<BillingCycle>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub features: Option<Option<serde_json::Value>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SetSortOrderRequest {
    pub sort_order: i32,
}
