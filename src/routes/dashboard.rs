use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::dashboard::{
    ApplicationRevenue, DashboardStats, RecentActivityParams, RecentMembership,
};
use crate::services::dashboard;

pub const ENTITY: &str = "dashboard";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/stats", get(stats))
        .route("/api/dashboard/revenue", get(revenue))
        .route("/api/dashboard/recent-activity", get(recent_activity))
}

async fn stats(
    State(state): State<AppState>,
    _auth: AuthAdmin,
) -> Result<Json<DashboardStats>, AppError> {
    let key = QueryCache::key(ENTITY, "stats", &());
    let stats = state
        .cache
        .get_or_load(key, || dashboard::stats(&state.db))
        .await?;
    Ok(Json(stats))
}

async fn revenue(
    State(state): State<AppState>,
    _auth: AuthAdmin,
) -> Result<Json<Vec<ApplicationRevenue>>, AppError> {
    let key = QueryCache::key(ENTITY, "revenue", &());
    let rows = state
        .cache
        .get_or_load(key, || dashboard::revenue_by_application(&state.db))
        .await?;
    Ok(Json(rows))
}

async fn recent_activity(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(params): Query<RecentActivityParams>,
) -> Result<Json<Vec<RecentMembership>>, AppError> {
    let key = QueryCache::key(ENTITY, "recent_activity", &params);
    let rows = state
        .cache
        .get_or_load(key, || dashboard::recent_activity(&state.db, params.limit))
        .await?;
    Ok(Json(rows))
}
