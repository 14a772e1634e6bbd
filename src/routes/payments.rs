use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, dashboard, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::Paginated;
use crate::models::payment::{
    CreatePaymentRequest, Payment, PaymentFilters, PaymentRow, UpdatePaymentRequest,
};
use crate::services::payments;

pub const ENTITY: &str = "payments";
const RESOURCE_TYPE: &str = "payment";

pub struct PaymentId;

impl Resource for PaymentId {
    const LABEL: &'static str = "payment";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payments", get(list_payments).post(create_payment))
        .route(
            "/api/payments/{id}",
            get(get_payment).patch(update_payment).delete(delete_payment),
        )
}

async fn list_payments(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<PaymentFilters>,
) -> Result<Json<Paginated<PaymentRow>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || payments::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_payment(
    State(state): State<AppState>,
    id: Id<PaymentId>,
    _auth: AuthAdmin,
) -> Result<Json<PaymentRow>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let payment = state
        .cache
        .get_or_load(key, || payments::get(&state.db, id.get()))
        .await?;
    Ok(Json(payment))
}

async fn create_payment(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    let payment = payments::create(&state.db, body).await?;

    let entry = auth
        .audit("CREATE_PAYMENT")
        .resource(RESOURCE_TYPE, payment.id)
        .details(json!({
            "user_id": payment.user_id,
            "membership_id": payment.membership_id,
            "amount": payment.amount,
            "currency": payment.currency,
            "status": payment.status,
        }));
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(payment))
}

async fn update_payment(
    State(state): State<AppState>,
    id: Id<PaymentId>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Payment>, AppError> {
    let updates: UpdatePaymentRequest = parse_body(&body)?;
    let payment = payments::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_PAYMENT")
        .resource(RESOURCE_TYPE, payment.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(payment))
}

async fn delete_payment(
    State(state): State<AppState>,
    id: Id<PaymentId>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    payments::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_PAYMENT")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(json!({ "deleted": true })))
}
