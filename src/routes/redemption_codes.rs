use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::{Id, Resource, after_mutation, parse_body};
use crate::AppState;
use crate::auth::middleware::AuthAdmin;
use crate::cache::QueryCache;
use crate::error::AppError;
use crate::models::Paginated;
use crate::models::Page;
use crate::models::redemption_code::{
    BatchCreateRequest, CodeStats, CreateRedemptionCodeRequest, ExportFilters, ExportFormat,
    RedemptionCode, RedemptionCodeFilters, RedemptionCodeRow, RedemptionCodeUseRow, StatsParams,
    UpdateRedemptionCodeRequest, UsesParams,
};
use crate::services::redemption_codes;
use crate::validation::ValidationError;

pub const ENTITY: &str = "redemption_codes";
const RESOURCE_TYPE: &str = "redemption_code";
pub const MAX_BATCH: i64 = 100;

pub struct Code;

impl Resource for Code {
    const LABEL: &'static str = "redemption code";
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/redemption-codes", get(list_codes).post(create_code))
        .route("/api/redemption-codes/batch", post(batch_create))
        .route("/api/redemption-codes/stats", get(stats))
        .route("/api/redemption-codes/export", get(export))
        .route(
            "/api/redemption-codes/{id}",
            get(get_code).patch(update_code).delete(delete_code),
        )
        .route("/api/redemption-codes/{id}/uses", get(list_uses))
}

/// Batches are issued in one statement and capped at [`MAX_BATCH`].
pub fn check_batch_count(count: i64) -> Result<usize, ValidationError> {
    if !(1..=MAX_BATCH).contains(&count) {
        return Err(ValidationError(format!(
            "Batch count must be between 1 and {MAX_BATCH}"
        )));
    }
    Ok(count as usize)
}

async fn list_codes(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<RedemptionCodeFilters>,
) -> Result<Json<Paginated<RedemptionCodeRow>>, AppError> {
    let key = QueryCache::key(ENTITY, "list", &filters);
    let page = state
        .cache
        .get_or_load(key, || redemption_codes::list(&state.db, &filters))
        .await?;
    Ok(Json(page))
}

async fn get_code(
    State(state): State<AppState>,
    id: Id<Code>,
    _auth: AuthAdmin,
) -> Result<Json<RedemptionCodeRow>, AppError> {
    let key = QueryCache::key(ENTITY, "get", &id.get());
    let code = state
        .cache
        .get_or_load(key, || redemption_codes::get(&state.db, id.get()))
        .await?;
    Ok(Json(code))
}

async fn create_code(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<CreateRedemptionCodeRequest>,
) -> Result<Json<RedemptionCode>, AppError> {
    let auto_generate = body.auto_generate;
    let code = redemption_codes::create(&state.db, body, auth.admin.id).await?;

    let entry = auth
        .audit("CREATE_REDEMPTION_CODE")
        .resource(RESOURCE_TYPE, code.id)
        .details(json!({
            "code": code.code,
            "application_id": code.application_id,
            "membership_plan_id": code.membership_plan_id,
            "auto_generate": auto_generate,
        }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(code))
}

async fn batch_create(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(body): Json<BatchCreateRequest>,
) -> Result<Json<Vec<RedemptionCode>>, AppError> {
    let count = check_batch_count(body.count)?;
    let template = body.template.validate()?;
    let application_id = template.application_id;
    let membership_plan_id = template.membership_plan_id;

    let codes = redemption_codes::batch_create(&state.db, count, template, auth.admin.id).await?;

    let entry = auth.audit("BATCH_CREATE_REDEMPTION_CODES").details(json!({
        "count": codes.len(),
        "application_id": application_id,
        "membership_plan_id": membership_plan_id,
    }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(codes))
}

async fn update_code(
    State(state): State<AppState>,
    id: Id<Code>,
    auth: AuthAdmin,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<RedemptionCode>, AppError> {
    let updates: UpdateRedemptionCodeRequest = parse_body(&body)?;
    let code = redemption_codes::update(&state.db, id.get(), updates).await?;

    let entry = auth
        .audit("UPDATE_REDEMPTION_CODE")
        .resource(RESOURCE_TYPE, code.id)
        .details(json!({ "updates": body }));
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(code))
}

async fn delete_code(
    State(state): State<AppState>,
    id: Id<Code>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, AppError> {
    redemption_codes::delete(&state.db, id.get()).await?;

    let entry = auth
        .audit("DELETE_REDEMPTION_CODE")
        .resource(RESOURCE_TYPE, id.get());
    after_mutation(&state, entry, &[ENTITY]).await;

    Ok(Json(json!({ "deleted": true })))
}

async fn list_uses(
    State(state): State<AppState>,
    id: Id<Code>,
    _auth: AuthAdmin,
    Query(params): Query<UsesParams>,
) -> Result<Json<Paginated<RedemptionCodeUseRow>>, AppError> {
    let page = Page::new(params.page, params.page_size);
    let key = QueryCache::key(ENTITY, "uses", &(id.get(), page));
    let uses = state
        .cache
        .get_or_load(key, || redemption_codes::uses(&state.db, id.get(), page))
        .await?;
    Ok(Json(uses))
}

async fn stats(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(params): Query<StatsParams>,
) -> Result<Json<CodeStats>, AppError> {
    let key = QueryCache::key(ENTITY, "stats", &params);
    let stats = state
        .cache
        .get_or_load(key, || redemption_codes::stats(&state.db, params.application_id))
        .await?;
    Ok(Json(stats))
}

/// Never cached: exports always read the current table.
async fn export(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Query(filters): Query<ExportFilters>,
) -> Result<Response, AppError> {
    let rows = redemption_codes::export(&state.db, &filters, &state.config.display_offset).await?;
    tracing::info!(rows = rows.len(), format = ?filters.format, "exported redemption codes");

    Ok(match filters.format {
        ExportFormat::Json => Json(rows).into_response(),
        ExportFormat::Tsv => {
            let text = rows
                .iter()
                .map(redemption_codes::format_export_line)
                .collect::<Vec<_>>()
                .join("\n");
            ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_count_bounds() {
        assert!(check_batch_count(0).is_err());
        assert!(check_batch_count(-5).is_err());
        assert!(check_batch_count(101).is_err());
        assert_eq!(check_batch_count(1).unwrap(), 1);
        assert_eq!(check_batch_count(100).unwrap(), 100);
    }

    #[test]
    fn batch_count_message() {
        let err = check_batch_count(500).unwrap_err();
        assert_eq!(err.to_string(), "Batch count must be between 1 and 100");
    }
}
