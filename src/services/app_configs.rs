use std::sync::LazyLock;

use regex::Regex;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::models::app_config::{
    AppConfig, AppConfigFilters, CreateAppConfigRequest, UpdateAppConfigRequest,
};
use crate::models::{Page, Paginated};
use crate::validation::{ValidationError, like_pattern, normalize_search};

const WHAT: &str = "App config";

static CONFIG_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.\-]{1,99}$").expect("static regex is valid")
});

fn check_key(key: &str) -> Result<String, ValidationError> {
    let key = key.trim();
    if !CONFIG_KEY_RE.is_match(key) {
        return Err(ValidationError::new(
            "Config key must start with a letter and use letters, digits, '_', '-' or '.'",
        ));
    }
    Ok(key.to_string())
}

fn filtered(head: &str, filters: &AppConfigFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(config_type) = filters.config_type {
        qb.push(" AND config_type = ").push_bind(config_type);
    }
    if let Some(is_active) = filters.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(search) = normalize_search(filters.search.as_deref()) {
        let pattern = like_pattern(&search);
        qb.push(" AND (config_key ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb
}

pub async fn list(
    pool: &PgPool,
    filters: &AppConfigFilters,
) -> Result<Paginated<AppConfig>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM app_configs", filters);
    let mut rows = filtered("SELECT * FROM app_configs", filters);
    rows.push(" ORDER BY created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<AppConfig, AppError> {
    sqlx::query_as::<_, AppConfig>("SELECT * FROM app_configs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

/// Only active configs are visible by key.
pub async fn get_by_key(pool: &PgPool, key: &str) -> Result<AppConfig, AppError> {
    sqlx::query_as::<_, AppConfig>(
        "SELECT * FROM app_configs WHERE config_key = $1 AND is_active",
    )
    .bind(key.trim())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn create(
    pool: &PgPool,
    req: CreateAppConfigRequest,
    admin_id: Uuid,
) -> Result<AppConfig, AppError> {
    let key = check_key(&req.config_key)?;
    if req.name.trim().is_empty() {
        return Err(ValidationError::new("Config name is required").into());
    }

    let config = sqlx::query_as::<_, AppConfig>(
        "INSERT INTO app_configs (config_key, name, description, config_data, config_type,
             is_active, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(&key)
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.config_data)
    .bind(req.config_type)
    .bind(req.is_active)
    .bind(admin_id)
    .fetch_one(pool)
    .await?;

    Ok(config)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdateAppConfigRequest,
) -> Result<AppConfig, AppError> {
    let key = req.config_key.as_deref().map(check_key).transpose()?;

    let mut update = Assignments::new("app_configs");
    update
        .set("config_key", key)
        .set("name", req.name)
        .set_nullable("description", req.description)
        .set("config_data", req.config_data)
        .set_nullable("config_type", req.config_type)
        .set("is_active", req.is_active)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<AppConfig, AppError> {
    let mut update = Assignments::new("app_configs");
    update.set("is_active", Some(is_active)).touch();
    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "app_configs", id, WHAT).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::app_config::ConfigType;

    #[test]
    fn config_keys() {
        assert_eq!(check_key(" llm.default ").unwrap(), "llm.default");
        assert!(check_key("feature_new-editor").is_ok());
        assert!(check_key("1abc").is_err());
        assert!(check_key("has space").is_err());
        assert!(check_key("x").is_err());
    }

    #[test]
    fn type_and_search_filters() {
        let qb = filtered(
            "SELECT COUNT(*) FROM app_configs",
            &AppConfigFilters {
                config_type: Some(ConfigType::FeatureFlag),
                search: Some("beta".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM app_configs WHERE 1=1 AND config_type = $1 \
             AND (config_key ILIKE $2 OR name ILIKE $3 OR description ILIKE $4)"
        );
    }
}
