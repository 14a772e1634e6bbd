use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::audit_log::{AuditLog, AuditLogFilters, AuditLogPage, LimitParams};
use crate::services::audit;

/// Every mutation route drops this entity after writing its audit entry.
pub const ENTITY: &str = "audit_logs";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/audit-logs", get(list_logs))
        .route("/api/audit-logs/recent", get(recent_logs))
}

async fn list_logs(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<AuditLogFilters>,
) -> Result<Json<AuditLogPage>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || audit::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn recent_logs(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<AuditLog>>, AppError> {
    let key = QueryCache::key(ENTITY, "recent", &params);
    let logs = state
        .cache
        .get_or_load(key, || audit::recent(&state.db, params.limit))
        .await?;
    Ok(Json(logs))
}
