use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::ids::generate_app_key;
use crate::models::application::{
    Application, ApplicationFilters, CreateApplicationRequest, UpdateApplicationRequest,
};
use crate::models::{Page, Paginated};
use crate::validation::{
    ValidationError, is_valid_slug, is_valid_url, like_pattern, normalize_search, sanitize_string,
};

const WHAT: &str = "Application";

fn check_name(name: &str) -> Result<String, ValidationError> {
    let name = sanitize_string(name);
    if name.is_empty() {
        return Err(ValidationError::new("Application name is required"));
    }
    Ok(name)
}

fn check_slug(slug: &str) -> Result<String, ValidationError> {
    let slug = slug.trim().to_string();
    if !is_valid_slug(&slug) {
        return Err(ValidationError::new(
            "Slug must be 3-100 lowercase letters, digits or single hyphens",
        ));
    }
    Ok(slug)
}

fn check_url(url: Option<String>) -> Result<Option<String>, ValidationError> {
    match url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
        Some(url) if !is_valid_url(&url) => Err(ValidationError::new("Invalid website URL")),
        other => Ok(other),
    }
}

fn filtered(head: &str, filters: &ApplicationFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(search) = normalize_search(filters.search.as_deref()) {
        let pattern = like_pattern(&search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR slug ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb
}

pub async fn list(
    pool: &PgPool,
    filters: &ApplicationFilters,
) -> Result<Paginated<Application>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM applications", filters);
    let mut rows = filtered("SELECT * FROM applications", filters);
    rows.push(" ORDER BY created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Application, AppError> {
    sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

/// The app key is always generated here, never taken from the request.
pub async fn create(
    pool: &PgPool,
    req: CreateApplicationRequest,
    admin_id: Uuid,
) -> Result<Application, AppError> {
    let name = check_name(&req.name)?;
    let slug = check_slug(&req.slug)?;
    let website_url = check_url(req.website_url)?;
    let description = req.description.map(|d| sanitize_string(&d));

    let app = sqlx::query_as::<_, Application>(
        "INSERT INTO applications (name, slug, app_key, description, website_url, is_active, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(&name)
    .bind(&slug)
    .bind(generate_app_key())
    .bind(description)
    .bind(website_url)
    .bind(req.is_active)
    .bind(admin_id)
    .fetch_one(pool)
    .await?;

    Ok(app)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdateApplicationRequest,
) -> Result<Application, AppError> {
    let name = req.name.as_deref().map(check_name).transpose()?;
    let slug = req.slug.as_deref().map(check_slug).transpose()?;
    let website_url = match req.website_url {
        Some(url) => Some(check_url(url)?),
        None => None,
    };

    let mut update = Assignments::new("applications");
    update
        .set("name", name)
        .set("slug", slug)
        .set_nullable(
            "description",
            req.description.map(|d| d.map(|d| sanitize_string(&d))),
        )
        .set_nullable("website_url", website_url)
        .set("is_active", req.is_active)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<Application, AppError> {
    let mut update = Assignments::new("applications");
    update.set("is_active", Some(is_active)).touch();
    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "applications", id, WHAT).await
}
