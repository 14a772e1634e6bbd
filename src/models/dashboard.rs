use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::membership::MembershipStatus;

/// Single-row `dashboard_stats` view.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub new_users_last_7_days: i64,
    pub total_applications: i64,
    pub active_applications: i64,
    pub active_memberships: i64,
    pub total_revenue: Decimal,
    pub avg_payment_amount: Decimal,
    pub pending_payment_amount: Decimal,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApplicationRevenue {
    pub application_id: Uuid,
    pub application_name: String,
    pub payment_count: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecentMembership {
    pub id: Uuid,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub user_email: Option<String>,
    pub user_full_name: Option<String>,
    pub application_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentActivityParams {
    pub limit: Option<i64>,
}
