//! Append-only log of administrative actions.
//!
//! [`log_action`] reports failures to its caller. Mutation handlers go through
//! [`record`], which logs a failed write and carries on: the primary change has
//! already been committed by then.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::audit_log::{
    AuditEntry, AuditLog, AuditLogFilters, AuditLogPage, DEFAULT_AUDIT_LIMIT,
    DEFAULT_RECENT_LIMIT, clamp_limit,
};
use crate::validation::{ValidationError, parse_uuid};

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to write audit log: {0}")]
    Database(#[from] sqlx::Error),
}

struct CheckedIds {
    admin_id: Uuid,
    target_user_id: Option<Uuid>,
}

fn check_ids(entry: &AuditEntry) -> Result<CheckedIds, ValidationError> {
    Ok(CheckedIds {
        admin_id: parse_uuid(&entry.admin_id, "admin")?,
        target_user_id: entry
            .target_user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| parse_uuid(id, "target user"))
            .transpose()?,
    })
}

pub async fn log_action(pool: &PgPool, entry: AuditEntry) -> Result<(), AuditError> {
    let ids = check_ids(&entry)?;

    sqlx::query(
        "INSERT INTO admin_audit_logs (admin_id, action, resource_type, resource_id,
             target_user_id, target_user_email, details, ip_address, user_agent)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(ids.admin_id)
    .bind(&entry.action)
    .bind(&entry.resource_type)
    .bind(entry.resource_id)
    .bind(ids.target_user_id)
    .bind(entry.target_user_email.filter(|e| !e.is_empty()))
    .bind(entry.details)
    .bind(entry.ip_address)
    .bind(entry.user_agent)
    .execute(pool)
    .await?;

    Ok(())
}

/// Writes `entry`, logging instead of returning any failure.
pub async fn record(pool: &PgPool, entry: AuditEntry) {
    let action = entry.action.clone();
    if let Err(e) = log_action(pool, entry).await {
        tracing::warn!(action = %action, error = %e, "failed to record audit log");
    }
}

pub async fn list(pool: &PgPool, filters: &AuditLogFilters) -> Result<AuditLogPage, AppError> {
    let admin_id = filters
        .admin_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| parse_uuid(id, "admin"))
        .transpose()?;
    let action = filters.action.as_deref().filter(|a| !a.is_empty());
    let limit = clamp_limit(filters.limit, DEFAULT_AUDIT_LIMIT);
    let offset = filters.offset.unwrap_or(0).max(0);

    let filtered = |head: &str| {
        let mut qb = QueryBuilder::<Postgres>::new(head);
        qb.push(" WHERE 1=1");
        if let Some(admin_id) = admin_id {
            qb.push(" AND admin_id = ").push_bind(admin_id);
        }
        if let Some(action) = action {
            qb.push(" AND action = ").push_bind(action.to_string());
        }
        qb
    };

    let mut count = filtered("SELECT COUNT(*) FROM admin_audit_logs");
    let mut rows = filtered("SELECT * FROM admin_audit_logs");
    rows.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let (count, data) = tokio::try_join!(
        count.build_query_scalar::<i64>().fetch_one(pool),
        rows.build_query_as::<AuditLog>().fetch_all(pool),
    )?;

    Ok(AuditLogPage {
        data,
        count,
        limit,
        offset,
    })
}

pub async fn by_target_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: Option<i64>,
) -> Result<Vec<AuditLog>, AppError> {
    let logs = sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM admin_audit_logs WHERE target_user_id = $1
         ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(clamp_limit(limit, DEFAULT_AUDIT_LIMIT))
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

pub async fn recent(pool: &PgPool, limit: Option<i64>) -> Result<Vec<AuditLog>, AppError> {
    let logs = sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM admin_audit_logs ORDER BY created_at DESC LIMIT $1",
    )
    .bind(clamp_limit(limit, DEFAULT_RECENT_LIMIT))
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    fn entry(admin_id: &str) -> AuditEntry {
        AuditEntry {
            admin_id: admin_id.into(),
            action: "UPDATE_USER".into(),
            ..Default::default()
        }
    }

    #[test]
    fn admin_id_must_be_a_uuid() {
        let err = check_ids(&entry("admin-1")).err().unwrap();
        assert_eq!(err.to_string(), "Invalid admin id format");
    }

    #[test]
    fn target_user_is_optional_but_checked() {
        let admin = Uuid::new_v4().to_string();
        assert_eq!(check_ids(&entry(&admin)).unwrap().target_user_id, None);

        let mut bad = entry(&admin);
        bad.target_user_id = Some("someone".into());
        let err = check_ids(&bad).err().unwrap();
        assert_eq!(err.to_string(), "Invalid target user id format");
    }

    #[tokio::test]
    async fn invalid_entries_fail_before_the_database() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://nobody@localhost:1/none")
            .unwrap();
        let err = log_action(&pool, entry("not-an-id")).await.unwrap_err();
        assert!(matches!(err, AuditError::Validation(_)));
    }

    #[tokio::test]
    async fn record_swallows_failures() {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(100))
            .connect_lazy("postgres://nobody@localhost:1/none")
            .unwrap();
        record(&pool, entry(&Uuid::new_v4().to_string())).await;
    }
}
