use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::models::app_version::{
    AppVersion, AppVersionFilters, AppVersionRow, CreateAppVersionRequest, Platform,
    UpdateAppVersionRequest,
};
use crate::models::{Page, Paginated};
use crate::validation::{ValidationError, is_valid_url, like_pattern, normalize_search};

const WHAT: &str = "App version";

const JOINED_SELECT: &str = "SELECT v.*, a.name AS application_name, a.slug AS application_slug
     FROM app_versions v
     LEFT JOIN applications a ON a.id = v.application_id";

fn check_download_url(url: Option<&str>) -> Result<(), ValidationError> {
    match url {
        Some(url) if !is_valid_url(url) => Err(ValidationError::new("Invalid download URL")),
        _ => Ok(()),
    }
}

fn check_version_number(version: &str) -> Result<(), ValidationError> {
    if version.trim().is_empty() {
        return Err(ValidationError::new("Version number is required"));
    }
    Ok(())
}

fn filtered(head: &str, filters: &AppVersionFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(application_id) = filters.application_id {
        qb.push(" AND v.application_id = ").push_bind(application_id);
    }
    if let Some(platform) = filters.platform {
        qb.push(" AND v.platform = ").push_bind(platform);
    }
    if let Some(is_published) = filters.is_published {
        qb.push(" AND v.is_published = ").push_bind(is_published);
    }
    if let Some(search) = normalize_search(filters.search.as_deref()) {
        let pattern = like_pattern(&search);
        qb.push(" AND (v.version_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR v.release_notes ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb
}

pub async fn list(
    pool: &PgPool,
    filters: &AppVersionFilters,
) -> Result<Paginated<AppVersionRow>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM app_versions v", filters);
    let mut rows = filtered(JOINED_SELECT, filters);
    rows.push(" ORDER BY v.version_code DESC, v.created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<AppVersionRow, AppError> {
    sqlx::query_as::<_, AppVersionRow>(&format!("{JOINED_SELECT} WHERE v.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

/// Highest published `version_code` for the platform, falling back to
/// versions published for `all`.
pub async fn latest(
    pool: &PgPool,
    application_id: Uuid,
    platform: Platform,
) -> Result<AppVersion, AppError> {
    sqlx::query_as::<_, AppVersion>(
        "SELECT * FROM app_versions
         WHERE application_id = $1 AND is_published AND platform IN ($2, 'all')
         ORDER BY (platform = $2) DESC, version_code DESC
         LIMIT 1",
    )
    .bind(application_id)
    .bind(platform)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("No published version found".into()))
}

pub async fn create(
    pool: &PgPool,
    req: CreateAppVersionRequest,
    admin_id: Uuid,
) -> Result<AppVersion, AppError> {
    check_version_number(&req.version_number)?;
    check_download_url(req.download_url.as_deref())?;

    let version = sqlx::query_as::<_, AppVersion>(
        "INSERT INTO app_versions (application_id, version_number, version_code, release_notes,
             download_url, file_size, file_hash, min_supported_version, is_force_update,
             is_published, platform, metadata, published_at, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
             CASE WHEN $10 THEN now() END, $13)
         RETURNING *",
    )
    .bind(req.application_id)
    .bind(req.version_number.trim())
    .bind(req.version_code)
    .bind(req.release_notes)
    .bind(req.download_url)
    .bind(req.file_size)
    .bind(req.file_hash)
    .bind(req.min_supported_version)
    .bind(req.is_force_update)
    .bind(req.is_published)
    .bind(req.platform)
    .bind(req.metadata)
    .bind(admin_id)
    .fetch_one(pool)
    .await?;

    Ok(version)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdateAppVersionRequest,
) -> Result<AppVersion, AppError> {
    if let Some(version) = &req.version_number {
        check_version_number(version)?;
    }
    if let Some(Some(url)) = &req.download_url {
        check_download_url(Some(url.as_str()))?;
    }

    let mut update = Assignments::new("app_versions");
    update
        .set("version_number", req.version_number.map(|v| v.trim().to_string()))
        .set("version_code", req.version_code)
        .set_nullable("release_notes", req.release_notes)
        .set_nullable("download_url", req.download_url)
        .set_nullable("file_size", req.file_size)
        .set_nullable("file_hash", req.file_hash)
        .set_nullable("min_supported_version", req.min_supported_version)
        .set("is_force_update", req.is_force_update)
        .set("platform", req.platform)
        .set_nullable("metadata", req.metadata)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn publish(pool: &PgPool, id: Uuid) -> Result<AppVersion, AppError> {
    sqlx::query_as::<_, AppVersion>(
        "UPDATE app_versions SET is_published = true, published_at = now(), updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn unpublish(pool: &PgPool, id: Uuid) -> Result<AppVersion, AppError> {
    sqlx::query_as::<_, AppVersion>(
        "UPDATE app_versions SET is_published = false, published_at = NULL, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn set_published(
    pool: &PgPool,
    id: Uuid,
    is_published: bool,
) -> Result<AppVersion, AppError> {
    if is_published {
        publish(pool, id).await
    } else {
        unpublish(pool, id).await
    }
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "app_versions", id, WHAT).await
}
