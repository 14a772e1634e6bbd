use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::models::payment_config::{
    CreatePaymentConfigRequest, PaymentConfig, PaymentConfigFilters, PaymentConfigRow,
    UpdatePaymentConfigRequest,
};
use crate::models::{Page, Paginated};
use crate::validation::ValidationError;

const WHAT: &str = "Payment config";

const JOINED_SELECT: &str = "SELECT pc.*, a.name AS application_name, a.slug AS application_slug
     FROM payment_configs pc
     LEFT JOIN applications a ON a.id = pc.application_id";

fn check_config(config: &serde_json::Value) -> Result<(), ValidationError> {
    if !config.is_object() {
        return Err(ValidationError::new("Payment config must be a JSON object"));
    }
    Ok(())
}

fn filtered(head: &str, filters: &PaymentConfigFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(application_id) = filters.application_id {
        qb.push(" AND pc.application_id = ").push_bind(application_id);
    }
    if let Some(method) = filters.payment_method {
        qb.push(" AND pc.payment_method = ").push_bind(method);
    }
    qb
}

pub async fn list(
    pool: &PgPool,
    filters: &PaymentConfigFilters,
) -> Result<Paginated<PaymentConfigRow>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM payment_configs pc", filters);
    let mut rows = filtered(JOINED_SELECT, filters);
    rows.push(" ORDER BY pc.created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<PaymentConfigRow, AppError> {
    sqlx::query_as::<_, PaymentConfigRow>(&format!("{JOINED_SELECT} WHERE pc.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn create(
    pool: &PgPool,
    req: CreatePaymentConfigRequest,
) -> Result<PaymentConfig, AppError> {
    check_config(&req.config)?;

    let config = sqlx::query_as::<_, PaymentConfig>(
        "INSERT INTO payment_configs (application_id, payment_method, config, is_active, is_sandbox)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(req.application_id)
    .bind(req.payment_method)
    .bind(&req.config)
    .bind(req.is_active)
    .bind(req.is_sandbox)
    .fetch_one(pool)
    .await?;

    Ok(config)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdatePaymentConfigRequest,
) -> Result<PaymentConfig, AppError> {
    if let Some(config) = &req.config {
        check_config(config)?;
    }

    let mut update = Assignments::new("payment_configs");
    update
        .set_nullable("application_id", req.application_id)
        .set("payment_method", req.payment_method)
        .set("config", req.config)
        .set("is_active", req.is_active)
        .set("is_sandbox", req.is_sandbox)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "payment_configs", id, WHAT).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn config_must_be_an_object() {
        assert!(check_config(&json!({"app_id": "wx123", "mch_id": "1900"})).is_ok());
        assert!(check_config(&json!(["app_id"])).is_err());
        assert!(check_config(&json!(null)).is_err());
    }
}
