use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::models::payment::{
    CreatePaymentRequest, Payment, PaymentFilters, PaymentRow, UpdatePaymentRequest,
};
use crate::models::{Page, Paginated};
use crate::validation::ValidationError;

const WHAT: &str = "Payment";

const JOINED_SELECT: &str = "SELECT p.*,
        u.email AS user_email, u.full_name AS user_full_name,
        a.name AS application_name, a.slug AS application_slug
     FROM payment_history p
     LEFT JOIN users u ON u.id = p.user_id
     LEFT JOIN user_app_memberships m ON m.id = p.membership_id
     LEFT JOIN applications a ON a.id = m.application_id";

fn check_amount(amount: Option<Decimal>) -> Result<(), ValidationError> {
    if amount.is_some_and(|a| a.is_sign_negative()) {
        return Err(ValidationError::new("Amount cannot be negative"));
    }
    Ok(())
}

fn filtered(head: &str, filters: &PaymentFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(user_id) = filters.user_id {
        qb.push(" AND p.user_id = ").push_bind(user_id);
    }
    if let Some(membership_id) = filters.membership_id {
        qb.push(" AND p.membership_id = ").push_bind(membership_id);
    }
    if let Some(status) = filters.status {
        qb.push(" AND p.status = ").push_bind(status);
    }
    qb
}

pub async fn list(pool: &PgPool, filters: &PaymentFilters) -> Result<Paginated<PaymentRow>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM payment_history p", filters);
    let mut rows = filtered(JOINED_SELECT, filters);
    rows.push(" ORDER BY p.created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<PaymentRow, AppError> {
    sqlx::query_as::<_, PaymentRow>(&format!("{JOINED_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn create(pool: &PgPool, req: CreatePaymentRequest) -> Result<Payment, AppError> {
    check_amount(Some(req.amount))?;

    let payment = sqlx::query_as::<_, Payment>(
        "INSERT INTO payment_history (membership_id, user_id, amount, currency, payment_method,
             transaction_id, status, invoice_url, paid_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING *",
    )
    .bind(req.membership_id)
    .bind(req.user_id)
    .bind(req.amount)
    .bind(&req.currency)
    .bind(&req.payment_method)
    .bind(&req.transaction_id)
    .bind(req.status)
    .bind(&req.invoice_url)
    .bind(req.paid_at)
    .fetch_one(pool)
    .await?;

    Ok(payment)
}

/// `payment_history` has no `updated_at`, so nothing is touched.
pub async fn update(pool: &PgPool, id: Uuid, req: UpdatePaymentRequest) -> Result<Payment, AppError> {
    check_amount(req.amount)?;

    let mut update = Assignments::new("payment_history");
    update
        .set_nullable("membership_id", req.membership_id)
        .set("amount", req.amount)
        .set("currency", req.currency)
        .set_nullable("payment_method", req.payment_method)
        .set_nullable("transaction_id", req.transaction_id)
        .set("status", req.status)
        .set_nullable("invoice_url", req.invoice_url)
        .set_nullable("paid_at", req.paid_at);

    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "payment_history", id, WHAT).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::PaymentStatus;

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(check_amount(Some(Decimal::new(-1, 0))).is_err());
        assert!(check_amount(Some(Decimal::ZERO)).is_ok());
        assert!(check_amount(None).is_ok());
    }

    #[test]
    fn filters_narrow_by_user_and_status() {
        let qb = filtered(
            "SELECT COUNT(*) FROM payment_history p",
            &PaymentFilters {
                user_id: Some(Uuid::new_v4()),
                status: Some(PaymentStatus::Refunded),
                ..Default::default()
            },
        );
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM payment_history p WHERE 1=1 AND p.user_id = $1 AND p.status = $2"
        );
    }
}
