use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::models::membership::{
    CreateMembershipRequest, Membership, MembershipFilters, MembershipRow, MembershipStatus,
    UpdateMembershipRequest,
};
use crate::models::{Page, Paginated};

const WHAT: &str = "Membership";

const JOINED_SELECT: &str = "SELECT m.*,
        u.email AS user_email, u.full_name AS user_full_name,
        a.name AS application_name, a.slug AS application_slug,
        mp.display_name AS plan_display_name, mp.plan_id AS plan_key
     FROM user_app_memberships m
     LEFT JOIN users u ON u.id = m.user_id
     LEFT JOIN applications a ON a.id = m.application_id
     LEFT JOIN membership_plans mp ON mp.id = m.membership_plan_id";

fn filtered(head: &str, filters: &MembershipFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(user_id) = filters.user_id {
        qb.push(" AND m.user_id = ").push_bind(user_id);
    }
    if let Some(application_id) = filters.application_id {
        qb.push(" AND m.application_id = ").push_bind(application_id);
    }
    if let Some(status) = filters.status {
        qb.push(" AND m.status = ").push_bind(status);
    }
    qb
}

pub async fn list(
    pool: &PgPool,
    filters: &MembershipFilters,
) -> Result<Paginated<MembershipRow>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM user_app_memberships m", filters);
    let mut rows = filtered(JOINED_SELECT, filters);
    rows.push(" ORDER BY m.created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<MembershipRow, AppError> {
    sqlx::query_as::<_, MembershipRow>(&format!("{JOINED_SELECT} WHERE m.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn create(pool: &PgPool, req: CreateMembershipRequest) -> Result<Membership, AppError> {
    let membership = sqlx::query_as::<_, Membership>(
        "INSERT INTO user_app_memberships (user_id, application_id, membership_plan_id, status,
             payment_status, billing_cycle, started_at, expires_at, trial_ends_at, metadata)
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, now()), $8, $9, $10)
         RETURNING *",
    )
    .bind(req.user_id)
    .bind(req.application_id)
    .bind(req.membership_plan_id)
    .bind(req.status)
    .bind(req.payment_status)
    .bind(req.billing_cycle)
    .bind(req.started_at)
    .bind(req.expires_at)
    .bind(req.trial_ends_at)
    .bind(req.metadata)
    .fetch_one(pool)
    .await?;

    Ok(membership)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdateMembershipRequest,
) -> Result<Membership, AppError> {
    let mut update = Assignments::new("user_app_memberships");
    update
        .set_nullable("membership_plan_id", req.membership_plan_id)
        .set("status", req.status)
        .set_nullable("payment_status", req.payment_status)
        .set_nullable("billing_cycle", req.billing_cycle)
        .set("started_at", req.started_at)
        .set_nullable("expires_at", req.expires_at)
        .set_nullable("trial_ends_at", req.trial_ends_at)
        .set_nullable("cancelled_at", req.cancelled_at)
        .set_nullable("metadata", req.metadata)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn set_status(
    pool: &PgPool,
    id: Uuid,
    status: MembershipStatus,
) -> Result<Membership, AppError> {
    let mut update = Assignments::new("user_app_memberships");
    update.set("status", Some(status)).touch();
    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "user_app_memberships", id, WHAT).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_binds_after_ids() {
        let qb = filtered(
            "SELECT COUNT(*) FROM user_app_memberships m",
            &MembershipFilters {
                user_id: Some(Uuid::new_v4()),
                status: Some(MembershipStatus::Expired),
                ..Default::default()
            },
        );
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM user_app_memberships m WHERE 1=1 AND m.user_id = $1 \
             AND m.status = $2"
        );
    }
}
