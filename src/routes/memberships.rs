use axum::extract::{Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, dashboard, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::Paginated;
use crate::models::membership::{
    CreateMembershipRequest, Membership, MembershipFilters, MembershipRow,
    SetMembershipStatusRequest, UpdateMembershipRequest,
};
use crate::services::memberships;

pub const ENTITY: &str = "memberships";
const RESOURCE_TYPE: &str = "membership";

/// Deleting a membership nulls `payment_history.membership_id`, which changes
/// the application shown on cached payment rows.
const DELETED: [&str; 3] = [ENTITY, super::payments::ENTITY, dashboard::ENTITY];

pub struct MembershipId;

impl Resource for MembershipId {
    const LABEL: &'static str = "membership";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/memberships", get(list_memberships).post(create_membership))
        .route(
            "/api/memberships/{id}",
            get(get_membership)
                .patch(update_membership)
                .delete(delete_membership),
        )
        .route("/api/memberships/{id}/status", put(set_status))
}

async fn list_memberships(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<MembershipFilters>,
) -> Result<Json<Paginated<MembershipRow>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || memberships::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_membership(
    State(state): State<AppState>,
    id: Id<MembershipId>,
    _auth: AuthAdmin,
) -> Result<Json<MembershipRow>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let membership = state
        .cache
        .get_or_load(key, || memberships::get(&state.db, id.get()))
        .await?;
    Ok(Json(membership))
}

async fn create_membership(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreateMembershipRequest>,
) -> Result<Json<Membership>, AppError> {
    let membership = memberships::create(&state.db, body).await?;

    let entry = auth
        .audit("CREATE_MEMBERSHIP")
        .resource(RESOURCE_TYPE, membership.id)
        .details(json!({
            "user_id": membership.user_id,
            "application_id": membership.application_id,
            "membership_plan_id": membership.membership_plan_id,
            "status": membership.status,
        }));
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(membership))
}

async fn update_membership(
    State(state): State<AppState>,
    id: Id<MembershipId>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Membership>, AppError> {
    let updates: UpdateMembershipRequest = parse_body(&body)?;
    let membership = memberships::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_MEMBERSHIP")
        .resource(RESOURCE_TYPE, membership.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(membership))
}

async fn set_status(
    State(state): State<AppState>,
    id: Id<MembershipId>,
    auth: AuthAdmin,
    Json(body): Json<SetMembershipStatusRequest>,
) -> Result<Json<Membership>, AppError> {
    let membership = memberships::set_status(&state.db, id.get(), body.status).await?;

    let entry = auth
        .audit("SET_MEMBERSHIP_STATUS")
        .resource(RESOURCE_TYPE, membership.id)
        .details(json!({ "status": body.status }));
    after_mutation(&state, entry, &[ENTITY, dashboard::ENTITY]).await;

    Ok(Json(membership))
}

async fn delete_membership(
    State(state): State<AppState>,
    id: Id<MembershipId>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    memberships::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_MEMBERSHIP")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &DELETED).await;

    Ok(Json(json!({ "deleted": true })))
}
