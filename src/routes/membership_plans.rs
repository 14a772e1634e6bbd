use axum::extract::{Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, memberships, parse_body, redemption_codes};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::Paginated;
use crate::models::membership_plan::{
    CreateMembershipPlanRequest, MembershipPlan, MembershipPlanFilters, MembershipPlanRow,
    SetSortOrderRequest, UpdateMembershipPlanRequest,
};
use crate::services::membership_plans;

pub const ENTITY: &str = "membership_plans";
const RESOURCE_TYPE: &str = "membership_plan";

/// Plan names are joined into membership and redemption-code rows.
const JOINED: [&str; 3] = [ENTITY, memberships::ENTITY, redemption_codes::ENTITY];

pub struct Plan;

impl Resource for Plan {
    const LABEL: &'static str = "membership plan";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/membership-plans", get(list_plans).post(create_plan))
        .route(
            "/api/membership-plans/{id}",
            get(get_plan).patch(update_plan).delete(delete_plan),
        )
        .route("/api/membership-plans/{id}/sort-order", put(set_sort_order))
}

async fn list_plans(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<MembershipPlanFilters>,
) -> Result<Json<Paginated<MembershipPlanRow>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || membership_plans::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_plan(
    State(state): State<AppState>,
    id: Id<Plan>,
    _auth: AuthAdmin,
) -> Result<Json<MembershipPlanRow>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let plan = state
        .cache
        .get_or_load(key, || membership_plans::get(&state.db, id.get()))
        .await?;
    Ok(Json(plan))
}

async fn create_plan(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreateMembershipPlanRequest>,
) -> Result<Json<MembershipPlan>, AppError> {
    let plan = membership_plans::create(&state.db, body).await?;

    let entry = auth
        .audit("CREATE_MEMBERSHIP_PLAN")
        .resource(RESOURCE_TYPE, plan.id)
        .details(json!({
            "plan_id": plan.plan_id,
            "application_id": plan.application_id,
            "price": plan.price,
            "duration_days": plan.duration_days,
        }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(plan))
}

async fn update_plan(
    State(state): State<AppState>,
    id: Id<Plan>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<MembershipPlan>, AppError> {
    let updates: UpdateMembershipPlanRequest = parse_body(&body)?;
    let plan = membership_plans::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_MEMBERSHIP_PLAN")
        .resource(RESOURCE_TYPE, plan.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &JOINED).await;

    Ok(Json(plan))
}

async fn set_sort_order(
    State(state): State<AppState>,
    id: Id<Plan>,
    auth: AuthAdmin,
    Json(body): Json<SetSortOrderRequest>,
) -> Result<Json<MembershipPlan>, AppError> {
    let plan = membership_plans::set_sort_order(&state.db, id.get(), body.sort_order).await?;

    let entry = auth
        .audit("SET_MEMBERSHIP_PLAN_SORT_ORDER")
        .resource(RESOURCE_TYPE, plan.id)
        .details(json!({ "sort_order": body.sort_order }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(plan))
}

async fn delete_plan(
    State(state): State<AppState>,
    id: Id<Plan>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    membership_plans::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_MEMBERSHIP_PLAN")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &JOINED).await;

    Ok(Json(json!({ "deleted": true })))
}
