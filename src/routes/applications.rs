use axum::extract::{Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, dashboard, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::application::{
    Application, ApplicationFilters, CreateApplicationRequest, UpdateApplicationRequest,
};
use crate::models::{Paginated, SetActiveRequest};
use crate::services::applications;

pub const ENTITY: &str = "applications";
const RESOURCE_TYPE: &str = "application";

/// Entities whose cached rows embed the application's name or slug.
const JOINED: [&str; 9] = [
    ENTITY,
    super::app_versions::ENTITY,
    super::membership_plans::ENTITY,
    super::memberships::ENTITY,
    super::payment_configs::ENTITY,
    super::payments::ENTITY,
    super::redemption_codes::ENTITY,
    super::users::ENTITY,
    dashboard::ENTITY,
];

pub struct App;

impl Resource for App {
    const LABEL: &'static str = "application";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/applications", get(list_applications).post(create_application))
        .route(
            "/api/applications/{id}",
            get(get_application)
                .patch(update_application)
                .delete(delete_application),
        )
        .route("/api/applications/{id}/active", put(set_active))
}

async fn list_applications(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<ApplicationFilters>,
) -> Result<Json<Paginated<Application>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || applications::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_application(
    State(state): State<AppState>,
    id: Id<App>,
    _auth: AuthAdmin,
) -> Result<Json<Application>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let app = state
        .cache
        .get_or_load(key, || applications::get(&state.db, id.get()))
        .await?;
    Ok(Json(app))
}

async fn create_application(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreateApplicationRequest>,
) -> Result<Json<Application>, AppError> {
    let app = applications::create(&state.db, body, auth.admin.id).await?;
    tracing::info!(application_id = %app.id, slug = %app.slug, "application created");

    let entry = auth
        .audit("CREATE_APPLICATION")
        .resource(RESOURCE_TYPE, app.id)
        .details(json!({ "name": app.name, "slug": app.slug }));
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(app))
}

async fn update_application(
    State(state): State<AppState>,
    id: Id<App>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Application>, AppError> {
    let updates: UpdateApplicationRequest = parse_body(&body)?;
    let app = applications::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_APPLICATION")
        .resource(RESOURCE_TYPE, app.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &JOINED).await;

    Ok(Json(app))
}

async fn set_active(
    State(state): State<AppState>,
    id: Id<App>,
    auth: AuthAdmin,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<Application>, AppError> {
    let app = applications::set_active(&state.db, id.get(), body.is_active).await?;

    let entry = auth
        .audit("SET_APPLICATION_ACTIVE")
        .resource(RESOURCE_TYPE, app.id)
        .details(json!({ "is_active": body.is_active }));
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(app))
}

/// Versions, plans, memberships and codes of the application go with it.
async fn delete_application(
    State(state): State<AppState>,
    id: Id<App>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    applications::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_APPLICATION")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &JOINED).await;

    Ok(Json(json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renames_reach_every_row_that_shows_the_application() {
        for entity in [
            super::super::payments::ENTITY,
            super::super::memberships::ENTITY,
            super::super::redemption_codes::ENTITY,
            dashboard::ENTITY,
        ] {
            assert!(JOINED.contains(&entity), "{entity} not invalidated");
        }
    }
}
