use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id};
use crate::error::AppError;
use crate::models::app_config::{
    AppConfigTemplate, CreateTemplateRequest, UpdateTemplateRequest, validate_template_fields,
};
use crate::validation::ValidationError;

const WHAT: &str = "Config template";

fn check_names(template_name: Option<&str>, display_name: Option<&str>) -> Result<(), ValidationError> {
    if template_name.is_some_and(|n| n.trim().is_empty()) {
        return Err(ValidationError::new("Template name is required"));
    }
    if display_name.is_some_and(|n| n.trim().is_empty()) {
        return Err(ValidationError::new("Display name is required"));
    }
    Ok(())
}

pub async fn list_active(pool: &PgPool) -> Result<Vec<AppConfigTemplate>, AppError> {
    let templates = sqlx::query_as::<_, AppConfigTemplate>(
        "SELECT * FROM app_config_templates WHERE is_active ORDER BY sort_order ASC, created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(templates)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<AppConfigTemplate, AppError> {
    sqlx::query_as::<_, AppConfigTemplate>("SELECT * FROM app_config_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn get_by_name(pool: &PgPool, name: &str) -> Result<AppConfigTemplate, AppError> {
    sqlx::query_as::<_, AppConfigTemplate>(
        "SELECT * FROM app_config_templates WHERE template_name = $1",
    )
    .bind(name.trim())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn create(
    pool: &PgPool,
    req: CreateTemplateRequest,
    admin_id: Uuid,
) -> Result<AppConfigTemplate, AppError> {
    check_names(Some(req.template_name.as_str()), Some(req.display_name.as_str()))?;
    validate_template_fields(&req.template_fields)?;

    let template = sqlx::query_as::<_, AppConfigTemplate>(
        "INSERT INTO app_config_templates (template_name, display_name, description,
             template_fields, example_data, icon, category, is_active, sort_order, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *",
    )
    .bind(req.template_name.trim())
    .bind(req.display_name.trim())
    .bind(&req.description)
    .bind(Json(&req.template_fields))
    .bind(&req.example_data)
    .bind(&req.icon)
    .bind(&req.category)
    .bind(req.is_active)
    .bind(req.sort_order)
    .bind(admin_id)
    .fetch_one(pool)
    .await?;

    Ok(template)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdateTemplateRequest,
) -> Result<AppConfigTemplate, AppError> {
    check_names(req.template_name.as_deref(), req.display_name.as_deref())?;
    if let Some(fields) = &req.template_fields {
        validate_template_fields(fields)?;
    }

    let mut update = Assignments::new("app_config_templates");
    update
        .set("template_name", req.template_name.map(|n| n.trim().to_string()))
        .set("display_name", req.display_name.map(|n| n.trim().to_string()))
        .set_nullable("description", req.description)
        .set("template_fields", req.template_fields.map(Json))
        .set_nullable("example_data", req.example_data)
        .set_nullable("icon", req.icon)
        .set_nullable("category", req.category)
        .set("is_active", req.is_active)
        .set("sort_order", req.sort_order)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "app_config_templates", id, WHAT).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cannot_be_blank() {
        assert!(check_names(Some(" "), None).is_err());
        assert!(check_names(None, Some("")).is_err());
        assert!(check_names(Some("llm_config"), Some("LLM")).is_ok());
        assert!(check_names(None, None).is_ok());
    }
}
