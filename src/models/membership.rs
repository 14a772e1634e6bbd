use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::membership_plan::BillingCycle;
use super::nullable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Inactive,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipPaymentStatus {
    Paid,
    Pending,
    Failed,
    Refunded,
}

/// A user's entitlement in one application (`user_app_memberships`).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub application_id: Uuid,
    pub membership_plan_id: Option<Uuid>,
    pub status: MembershipStatus,
    pub payment_status: Option<MembershipPaymentStatus>,
    pub billing_cycle: Option<BillingCycle>,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MembershipRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub membership: Membership,
    pub user_email: Option<String>,
    pub user_full_name: Option<String>,
    pub application_name: Option<String>,
    pub application_slug: Option<String>,
    pub plan_display_name: Option<String>,
    pub plan_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipFilters {
    pub user_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub status: Option<MembershipStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMembershipRequest {
    pub user_id: Uuid,
    pub application_id: Uuid,
    pub membership_plan_id: Option<Uuid>,
    pub status: MembershipStatus,
    pub payment_status: Option<MembershipPaymentStatus>,
    pub billing_cycle: Option<BillingCycle>,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMembershipRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub membership_plan_id: Option<Option<Uuid>>,
    pub status: Option<MembershipStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub payment_status: Option<Option<MembershipPaymentStatus>>,
    #[serde(default, deserialize_with = "nullable")]
    pub billing_cycle: Option<Option<BillingCycle>>,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub trial_ends_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cancelled_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: Option<Option<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SetMembershipStatusRequest {
    pub status: MembershipStatus,
}
