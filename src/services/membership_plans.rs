use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::models::membership_plan::{
    CreateMembershipPlanRequest, MembershipPlan, MembershipPlanFilters, MembershipPlanRow,
    UpdateMembershipPlanRequest,
};
use crate::models::{Page, Paginated};
use crate::validation::ValidationError;

const WHAT: &str = "Membership plan";

const JOINED_SELECT: &str = "SELECT mp.*, a.name AS application_name, a.slug AS application_slug
     FROM membership_plans mp
     LEFT JOIN applications a ON a.id = mp.application_id";

fn check_terms(duration_days: Option<i32>, price: Option<Decimal>) -> Result<(), ValidationError> {
    if duration_days.is_some_and(|d| d <= 0) {
        return Err(ValidationError::new("Duration must be at least one day"));
    }
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err(ValidationError::new("Price cannot be negative"));
    }
    Ok(())
}

fn filtered(head: &str, filters: &MembershipPlanFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(application_id) = filters.application_id {
        qb.push(" AND mp.application_id = ").push_bind(application_id);
    }
    if let Some(is_active) = filters.is_active {
        qb.push(" AND mp.is_active = ").push_bind(is_active);
    }
    qb
}

pub async fn list(
    pool: &PgPool,
    filters: &MembershipPlanFilters,
) -> Result<Paginated<MembershipPlanRow>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM membership_plans mp", filters);
    let mut rows = filtered(JOINED_SELECT, filters);
    rows.push(" ORDER BY mp.sort_order ASC, mp.created_at ASC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<MembershipPlanRow, AppError> {
    sqlx::query_as::<_, MembershipPlanRow>(&format!("{JOINED_SELECT} WHERE mp.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn create(
    pool: &PgPool,
    req: CreateMembershipPlanRequest,
) -> Result<MembershipPlan, AppError> {
    check_terms(Some(req.duration_days), Some(req.price))?;
    if req.plan_id.trim().is_empty() || req.display_name.trim().is_empty() {
        return Err(ValidationError::new("Plan key and display name are required").into());
    }

    let plan = sqlx::query_as::<_, MembershipPlan>(
        "INSERT INTO membership_plans (application_id, plan_id, name, display_name, duration_days,
             price, currency, billing_cycle, description, features, is_active, sort_order)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING *",
    )
    .bind(req.application_id)
    .bind(req.plan_id.trim())
    .bind(&req.name)
    .bind(req.display_name.trim())
    .bind(req.duration_days)
    .bind(req.price)
    .bind(&req.currency)
    .bind(req.billing_cycle)
    .bind(&req.description)
    .bind(&req.features)
    .bind(req.is_active)
    .bind(req.sort_order)
    .fetch_one(pool)
    .await?;

    Ok(plan)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdateMembershipPlanRequest,
) -> Result<MembershipPlan, AppError> {
    check_terms(req.duration_days, req.price)?;

    let mut update = Assignments::new("membership_plans");
    update
        .set_nullable("application_id", req.application_id)
        .set("plan_id", req.plan_id)
        .set("name", req.name)
        .set("display_name", req.display_name)
        .set("duration_days", req.duration_days)
        .set("price", req.price)
        .set("currency", req.currency)
        .set_nullable("billing_cycle", req.billing_cycle)
        .set_nullable("description", req.description)
        .set_nullable("features", req.features)
        .set("is_active", req.is_active)
        .set("sort_order", req.sort_order)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn set_sort_order(
    pool: &PgPool,
    id: Uuid,
    sort_order: i32,
) -> Result<MembershipPlan, AppError> {
    let mut update = Assignments::new("membership_plans");
    update.set("sort_order", Some(sort_order)).touch();
    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "membership_plans", id, WHAT).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_reject_nonsense() {
        assert!(check_terms(Some(0), None).is_err());
        assert!(check_terms(None, Some(Decimal::new(-100, 2))).is_err());
        assert!(check_terms(Some(30), Some(Decimal::new(1999, 2))).is_ok());
        assert!(check_terms(None, None).is_ok());
    }
}
