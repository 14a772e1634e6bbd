use axum::extract::{Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::Paginated;
use crate::models::app_version::{
    AppVersion, AppVersionFilters, AppVersionRow, CreateAppVersionRequest, LatestVersionParams,
    SetPublishedRequest, UpdateAppVersionRequest,
};
use crate::services::app_versions;

pub const ENTITY: &str = "app_versions";
const RESOURCE_TYPE: &str = "app_version";

pub struct Version;

impl Resource for Version {
    const LABEL: &'static str = "app version";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/app-versions", get(list_versions).post(create_version))
        .route("/api/app-versions/latest", get(latest_version))
        .route(
            "/api/app-versions/{id}",
            get(get_version).patch(update_version).delete(delete_version),
        )
        .route("/api/app-versions/{id}/published", put(set_published))
}

async fn list_versions(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<AppVersionFilters>,
) -> Result<Json<Paginated<AppVersionRow>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || app_versions::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn latest_version(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(params): Query<LatestVersionParams>,
) -> Result<Json<AppVersion>, AppError> {
    let key = QueryCache::key(ENTITY, "latest", &params);
    let version = state
        .cache
        .get_or_load(key, || {
            app_versions::latest(&state.db, params.application_id, params.platform)
        })
        .await?;
    Ok(Json(version))
}

async fn get_version(
    State(state): State<AppState>,
    id: Id<Version>,
    _auth: AuthAdmin,
) -> Result<Json<AppVersionRow>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let version = state
        .cache
        .get_or_load(key, || app_versions::get(&state.db, id.get()))
        .await?;
    Ok(Json(version))
}

async fn create_version(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreateAppVersionRequest>,
) -> Result<Json<AppVersion>, AppError> {
    let version = app_versions::create(&state.db, body, auth.admin.id).await?;

    let entry = auth
        .audit("CREATE_APP_VERSION")
        .resource(RESOURCE_TYPE, version.id)
        .details(json!({
            "application_id": version.application_id,
            "version_number": version.version_number,
            "version_code": version.version_code,
            "platform": version.platform,
        }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(version))
}

async fn update_version(
    State(state): State<AppState>,
    id: Id<Version>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AppVersion>, AppError> {
    let updates: UpdateAppVersionRequest = parse_body(&body)?;
    let version = app_versions::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_APP_VERSION")
        .resource(RESOURCE_TYPE, version.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(version))
}

async fn set_published(
    State(state): State<AppState>,
    id: Id<Version>,
    auth: AuthAdmin,
    Json(body): Json<SetPublishedRequest>,
) -> Result<Json<AppVersion>, AppError> {
    let version = app_versions::set_published(&state.db, id.get(), body.is_published).await?;

    let action = if body.is_published {
        "PUBLISH_APP_VERSION"
    } else {
        "UNPUBLISH_APP_VERSION"
    };
    let entry = auth
        .audit(action)
        .resource(RESOURCE_TYPE, version.id)
        .details(json!({ "version_number": version.version_number }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(version))
}

async fn delete_version(
    State(state): State<AppState>,
    id: Id<Version>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    app_versions::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_APP_VERSION")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(json!({ "deleted": true })))
}
