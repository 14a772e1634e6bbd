use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::app_config::{
    AppConfig, AppConfigFilters, CreateAppConfigRequest, UpdateAppConfigRequest,
};
use crate::models::{Paginated, SetActiveRequest};
use crate::services::app_configs;

pub const ENTITY: &str = "app_configs";
const RESOURCE_TYPE: &str = "app_config";

pub struct ConfigId;

impl Resource for ConfigId {
    const LABEL: &'static str = "app config";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/app-configs", get(list_configs).post(create_config))
        .route("/api/app-configs/by-key/{key}", get(get_config_by_key))
        .route(
            "/api/app-configs/{id}",
            get(get_config).patch(update_config).delete(delete_config),
        )
        .route("/api/app-configs/{id}/active", put(set_active))
}

async fn list_configs(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<AppConfigFilters>,
) -> Result<Json<Paginated<AppConfig>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || app_configs::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_config(
    State(state): State<AppState>,
    id: Id<ConfigId>,
    _auth: AuthAdmin,
) -> Result<Json<AppConfig>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let config = state
        .cache
        .get_or_load(key, || app_configs::get(&state.db, id.get()))
        .await?;
    Ok(Json(config))
}

async fn get_config_by_key(
    State(state): State<AppState>,
    Path(config_key): Path<String>,
    _auth: AuthAdmin,
) -> Result<Json<AppConfig>, AppError> {
    let key = QueryCache::key(ENTITY, "by_key", &config_key);
    let config = state
        .cache
        .get_or_load(key, || app_configs::get_by_key(&state.db, &config_key))
        .await?;
    Ok(Json(config))
}

async fn create_config(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreateAppConfigRequest>,
) -> Result<Json<AppConfig>, AppError> {
    let config = app_configs::create(&state.db, body, auth.admin.id).await?;

    let entry = auth
        .audit("CREATE_APP_CONFIG")
        .resource(RESOURCE_TYPE, config.id)
        .details(json!({
            "config_key": config.config_key,
            "config_type": config.config_type,
        }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(config))
}

async fn update_config(
    State(state): State<AppState>,
    id: Id<ConfigId>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AppConfig>, AppError> {
    let updates: UpdateAppConfigRequest = parse_body(&body)?;
    let config = app_configs::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_APP_CONFIG")
        .resource(RESOURCE_TYPE, config.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(config))
}

async fn set_active(
    State(state): State<AppState>,
    id: Id<ConfigId>,
    auth: AuthAdmin,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<AppConfig>, AppError> {
    let config = app_configs::set_active(&state.db, id.get(), body.is_active).await?;

    let entry = auth
        .audit("SET_APP_CONFIG_ACTIVE")
        .resource(RESOURCE_TYPE, config.id)
        .details(json!({ "config_key": config.config_key, "is_active": body.is_active }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(config))
}

async fn delete_config(
    State(state): State<AppState>,
    id: Id<ConfigId>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    app_configs::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_APP_CONFIG")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(json!({ "deleted": true })))
}
