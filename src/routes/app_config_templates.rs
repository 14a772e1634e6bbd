use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::app_config::{AppConfigTemplate, CreateTemplateRequest, UpdateTemplateRequest};
use crate::services::app_config_templates;

pub const ENTITY: &str = "app_config_templates";
const RESOURCE_TYPE: &str = "app_config_template";

pub struct TemplateId;

impl Resource for TemplateId {
    const LABEL: &'static str = "config template";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/app-config-templates",
            get(list_templates).post(create_template),
        )
        .route(
            "/api/app-config-templates/by-name/{name}",
            get(get_template_by_name),
        )
        .route(
            "/api/app-config-templates/{id}",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
}

/// Active templates only, in display order.
async fn list_templates(
    State(state): State<AppState>,
    _auth: AuthAdmin,
) -> Result<Json<Vec<AppConfigTemplate>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &());
    let templates = state
        .cache
        .get_or_load(key, || app_config_templates::list_active(&state.db))
        .await?;
    Ok(Json(templates))
}

async fn get_template(
    State(state): State<AppState>,
    id: Id<TemplateId>,
    _auth: AuthAdmin,
) -> Result<Json<AppConfigTemplate>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let template = state
        .cache
        .get_or_load(key, || app_config_templates::get(&state.db, id.get()))
        .await?;
    Ok(Json(template))
}

async fn get_template_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
    _auth: AuthAdmin,
) -> Result<Json<AppConfigTemplate>, AppError> {
    let key = QueryCache::key(ENTITY, "by_name", &name);
    let template = state
        .cache
        .get_or_load(key, || app_config_templates::get_by_name(&state.db, &name))
        .await?;
    Ok(Json(template))
}

async fn create_template(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreateTemplateRequest>,
) -> Result<Json<AppConfigTemplate>, AppError> {
    let template = app_config_templates::create(&state.db, body, auth.admin.id).await?;

    let entry = auth
        .audit("CREATE_CONFIG_TEMPLATE")
        .resource(RESOURCE_TYPE, template.id)
        .details(json!({
            "template_name": template.template_name,
            "fields": template.template_fields.len(),
        }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(template))
}

async fn update_template(
    State(state): State<AppState>,
    id: Id<TemplateId>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AppConfigTemplate>, AppError> {
    let updates: UpdateTemplateRequest = parse_body(&body)?;
    let template = app_config_templates::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_CONFIG_TEMPLATE")
        .resource(RESOURCE_TYPE, template.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(template))
}

async fn delete_template(
    State(state): State<AppState>,
    id: Id<TemplateId>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    app_config_templates::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_CONFIG_TEMPLATE")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(json!({ "deleted": true })))
}
