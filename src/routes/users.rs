use axum::extract::{Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, audit_logs, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::Paginated;
use crate::models::audit_log::{AuditLog, LimitParams};
use crate::models::user::{SetBannedRequest, UpdateUserRequest, User, UserFilters, UserRow};
use crate::services::{audit, users};

pub const ENTITY: &str = "users";
const RESOURCE_TYPE: &str = "user";

/// Entities whose cached rows embed the user's email or name.
const JOINED: [&str; 3] = [ENTITY, super::memberships::ENTITY, super::payments::ENTITY];

pub struct UserId;

impl Resource for UserId {
    const LABEL: &'static str = "user";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/{id}", get(get_user).patch(update_user))
        .route("/api/users/{id}/banned", put(set_banned))
        .route("/api/users/{id}/audit-logs", get(user_audit_logs))
}

async fn list_users(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<UserFilters>,
) -> Result<Json<Paginated<UserRow>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || users::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_user(
    State(state): State<AppState>,
    id: Id<UserId>,
    _auth: AuthAdmin,
) -> Result<Json<UserRow>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let user = state
        .cache
        .get_or_load(key, || users::get(&state.db, id.get()))
        .await?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    id: Id<UserId>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<User>, AppError> {
    let updates: UpdateUserRequest = parse_body(&body)?;
    let user = users::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_USER")
        .resource(RESOURCE_TYPE, user.id)
        .target_user(user.id, &user.email)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &JOINED).await;

    Ok(Json(user))
}

async fn set_banned(
    State(state): State<AppState>,
    id: Id<UserId>,
    auth: AuthAdmin,
    Json(body): Json<SetBannedRequest>,
) -> Result<Json<User>, AppError> {
    let user = users::set_banned(&state.db, id.get(), body.is_banned).await?;
    tracing::info!(user_id = %user.id, is_banned = body.is_banned, "user ban state changed");

    let action = if body.is_banned { "BAN_USER" } else { "UNBAN_USER" };
    let entry = auth
        .audit(action)
        .resource(RESOURCE_TYPE, user.id)
        .target_user(user.id, &user.email)
        .details(json!({ "is_banned": body.is_banned, "reason": body.reason }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(user))
}

async fn user_audit_logs(
    State(state): State<AppState>,
    id: Id<UserId>,
    _auth: AuthAdmin,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<AuditLog>>, AppError> {
    let key = QueryCache::key(audit_logs::ENTITY, "by_user", &(id.get(), params.limit));
    let logs = state
        .cache
        .get_or_load(key, || audit::by_target_user(&state.db, id.get(), params.limit))
        .await?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_edits_drop_rows_that_embed_the_user() {
        assert!(JOINED.contains(&super::super::memberships::ENTITY));
        assert!(JOINED.contains(&super::super::payments::ENTITY));
    }
}
