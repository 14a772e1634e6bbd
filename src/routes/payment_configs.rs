use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::Paginated;
use crate::models::payment_config::{
    CreatePaymentConfigRequest, PaymentConfig, PaymentConfigFilters, PaymentConfigRow,
    UpdatePaymentConfigRequest,
};
use crate::services::payment_configs;

pub const ENTITY: &str = "payment_configs";
const RESOURCE_TYPE: &str = "payment_config";

pub struct PaymentConfigId;

impl Resource for PaymentConfigId {
    const LABEL: &'static str = "payment config";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payment-configs", get(list_configs).post(create_config))
        .route(
            "/api/payment-configs/{id}",
            get(get_config).patch(update_config).delete(delete_config),
        )
}

/// Names of the submitted fields. Gateway credentials never reach the audit
/// log.
fn updated_fields(body: &serde_json::Value) -> Vec<String> {
    body.as_object()
        .map(|fields| fields.keys().cloned().collect())
        .unwrap_or_default()
}

async fn list_configs(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<PaymentConfigFilters>,
) -> Result<Json<Paginated<PaymentConfigRow>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || payment_configs::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_config(
    State(state): State<AppState>,
    id: Id<PaymentConfigId>,
    _auth: AuthAdmin,
) -> Result<Json<PaymentConfigRow>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let config = state
        .cache
        .get_or_load(key, || payment_configs::get(&state.db, id.get()))
        .await?;
    Ok(Json(config))
}

async fn create_config(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreatePaymentConfigRequest>,
) -> Result<Json<PaymentConfig>, AppError> {
    let config = payment_configs::create(&state.db, body).await?;

    let entry = auth
        .audit("CREATE_PAYMENT_CONFIG")
        .resource(RESOURCE_TYPE, config.id)
        .details(json!({
            "application_id": config.application_id,
            "payment_method": config.payment_method,
            "is_sandbox": config.is_sandbox,
        }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(config))
}

async fn update_config(
    State(state): State<AppState>,
    id: Id<PaymentConfigId>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<PaymentConfig>, AppError> {
    let updates: UpdatePaymentConfigRequest = parse_body(&body)?;
    let config = payment_configs::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_PAYMENT_CONFIG")
        .resource(RESOURCE_TYPE, config.id)
        .details(json!({ "fields": updated_fields(&body) }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(config))
}

async fn delete_config(
    State(state): State<AppState>,
    id: Id<PaymentConfigId>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    payment_configs::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_PAYMENT_CONFIG")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_details_list_fields_without_values() {
        let body = json!({ "config": { "secret_key": "sk_live_x" }, "is_sandbox": true });
        let mut fields = updated_fields(&body);
        fields.sort();
        assert_eq!(fields, vec!["config", "is_sandbox"]);
        assert!(updated_fields(&json!(null)).is_empty());
    }
}
