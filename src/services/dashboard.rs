use sqlx::PgPool;

use crate::error::AppError;
use crate::models::audit_log::{DEFAULT_RECENT_LIMIT, clamp_limit};
use crate::models::dashboard::{ApplicationRevenue, DashboardStats, RecentMembership};

pub async fn stats(pool: &PgPool) -> Result<DashboardStats, AppError> {
    let stats = sqlx::query_as::<_, DashboardStats>("SELECT * FROM dashboard_stats")
        .fetch_one(pool)
        .await?;

    Ok(stats)
}

pub async fn revenue_by_application(pool: &PgPool) -> Result<Vec<ApplicationRevenue>, AppError> {
    let rows = sqlx::query_as::<_, ApplicationRevenue>(
        "SELECT * FROM revenue_by_application ORDER BY total_revenue DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Latest memberships with their user and application names.
pub async fn recent_activity(
    pool: &PgPool,
    limit: Option<i64>,
) -> Result<Vec<RecentMembership>, AppError> {
    let rows = sqlx::query_as::<_, RecentMembership>(
        "SELECT m.id, m.status, m.created_at,
            u.email AS user_email, u.full_name AS user_full_name,
            a.name AS application_name
         FROM user_app_memberships m
         LEFT JOIN users u ON u.id = m.user_id
         LEFT JOIN applications a ON a.id = m.application_id
         ORDER BY m.created_at DESC
         LIMIT $1",
    )
    .bind(clamp_limit(limit, DEFAULT_RECENT_LIMIT))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
