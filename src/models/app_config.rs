use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use super::application::default_true;
use super::nullable;
use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConfigType {
    Announcement,
    LlmConfig,
    ApiConfig,
    FeatureFlag,
    Custom,
}

/// Free-form JSON configuration published to client applications.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppConfig {
    pub id: Uuid,
    pub config_key: String,
    pub name: String,
    pub description: Option<String>,
    pub config_data: serde_json::Value,
    pub config_type: Option<ConfigType>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfigFilters {
    pub config_type: Option<ConfigType>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppConfigRequest {
    pub config_key: String,
    pub name: String,
    pub description: Option<String>,
    pub config_data: serde_json::Value,
    pub config_type: Option<ConfigType>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppConfigRequest {
    pub config_key: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub config_data: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub config_type: Option<Option<ConfigType>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFieldType {
    Text,
    Textarea,
    Number,
    Password,
    Date,
    Select,
    Switch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: TemplateFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Checks that keys are present and unique and that select fields carry options.
pub fn validate_template_fields(fields: &[TemplateField]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for field in fields {
        let key = field.key.trim();
        if key.is_empty() {
            return Err(ValidationError::new("Template field key is required"));
        }
        if !seen.insert(key) {
            return Err(ValidationError(format!("Duplicate template field key: {key}")));
        }
        if field.field_type == TemplateFieldType::Select
            && field.options.as_ref().is_none_or(|o| o.is_empty())
        {
            return Err(ValidationError(format!(
                "Select field {key} needs at least one option"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppConfigTemplate {
    pub id: Uuid,
    pub template_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub template_fields: Json<Vec<TemplateField>>,
    pub example_data: Option<serde_json::Value>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub template_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub template_fields: Vec<TemplateField>,
    pub example_data: Option<serde_json::Value>,
    pub icon: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateRequest {
    pub template_name: Option<String>,
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub template_fields: Option<Vec<TemplateField>>,
    #[serde(default, deserialize_with = "nullable")]
    pub example_data: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(key: &str, field_type: TemplateFieldType) -> TemplateField {
        TemplateField {
            key: key.into(),
            label: key.into(),
            field_type,
            required: false,
            placeholder: None,
            options: None,
        }
    }

    #[test]
    fn fields_parse_from_template_json() {
        let fields: Vec<TemplateField> = serde_json::from_str(
            r#"[{"key":"model","label":"Model","type":"select","required":true,"options":["a","b"]},
                {"key":"api_key","label":"API key","type":"password","required":true}]"#,
        )
        .unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].field_type, TemplateFieldType::Password);
        assert!(validate_template_fields(&fields).is_ok());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let fields = vec![
            field("title", TemplateFieldType::Text),
            field("title", TemplateFieldType::Textarea),
        ];
        assert!(validate_template_fields(&fields).is_err());
    }

    #[test]
    fn select_needs_options() {
        let fields = vec![field("mode", TemplateFieldType::Select)];
        let err = validate_template_fields(&fields).unwrap_err();
        assert!(err.to_string().contains("mode"));
    }

    #[test]
    fn config_type_uses_snake_case() {
        let t: ConfigType = serde_json::from_str(r#""feature_flag""#).unwrap();
        assert_eq!(t, ConfigType::FeatureFlag);
    }
}
