use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::application::default_true;
use super::nullable;
use crate::validation::{ValidationError, parse_uuid};

/// Maximum length accepted for a hand-typed code.
pub const MAX_MANUAL_CODE_LEN: usize = 32;

/// `max_uses` value meaning "no limit".
pub const UNLIMITED_USES: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    Single,
    Multiple,
    Batch,
}

/// Stored as given. Nothing in this service derives `Expired` or `Exhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    Active,
    Expired,
    Exhausted,
    Disabled,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RedemptionCode {
    pub id: Uuid,
    pub code: String,
    pub code_type: CodeType,
    pub application_id: Uuid,
    pub membership_plan_id: Uuid,
    pub max_uses: i32,
    pub current_uses: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub status: CodeStatus,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedemptionCode {
    /// `"3 / 10"`, or `"3 / ∞"` for unlimited codes.
    pub fn uses_label(&self) -> String {
        let max = if self.max_uses == UNLIMITED_USES {
            "∞".to_string()
        } else {
            self.max_uses.to_string()
        };
        format!("{} / {max}", self.current_uses)
    }
}

/// A code joined with its application and plan for list and detail views.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RedemptionCodeRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub code: RedemptionCode,
    pub application_name: Option<String>,
    pub application_slug: Option<String>,
    pub plan_key: Option<String>,
    pub plan_display_name: Option<String>,
    pub plan_price: Option<Decimal>,
    pub plan_currency: Option<String>,
    pub plan_duration_days: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedemptionCodeFilters {
    pub application_id: Option<Uuid>,
    pub status: Option<CodeStatus>,
    pub code_type: Option<CodeType>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Fields shared by every code of a single or batch issue, as submitted.
/// Foreign keys arrive as strings and are checked for UUID shape only.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeTemplateInput {
    pub application_id: String,
    pub membership_plan_id: String,
    pub code_type: CodeType,
    #[serde(default = "default_max_uses")]
    pub max_uses: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub status: Option<CodeStatus>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

fn default_max_uses() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeTemplate {
    pub application_id: Uuid,
    pub membership_plan_id: Uuid,
    pub code_type: CodeType,
    pub max_uses: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub status: CodeStatus,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CodeTemplateInput {
    pub fn validate(self) -> Result<CodeTemplate, ValidationError> {
        Ok(CodeTemplate {
            application_id: parse_uuid(&self.application_id, "application")?,
            membership_plan_id: parse_uuid(&self.membership_plan_id, "membership plan")?,
            code_type: self.code_type,
            max_uses: self.max_uses,
            valid_from: self.valid_from.unwrap_or_else(Utc::now),
            valid_until: self.valid_until,
            is_active: self.is_active,
            status: self.status.unwrap_or(CodeStatus::Active),
            description: self.description.filter(|d| !d.trim().is_empty()),
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRedemptionCodeRequest {
    #[serde(flatten)]
    pub template: CodeTemplateInput,
    pub code: Option<String>,
    #[serde(default)]
    pub auto_generate: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchCreateRequest {
    pub count: i64,
    pub template: CodeTemplateInput,
}

/// A fully built row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRedemptionCode {
    pub code: String,
    pub template: CodeTemplate,
    pub current_uses: i32,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRedemptionCodeRequest {
    pub code: Option<String>,
    pub code_type: Option<CodeType>,
    pub application_id: Option<String>,
    pub membership_plan_id: Option<String>,
    pub max_uses: Option<i32>,
    pub current_uses: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub valid_until: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub status: Option<CodeStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: Option<Option<serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CodeStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
    pub exhausted: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsParams {
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Tsv,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportFilters {
    pub application_id: Option<Uuid>,
    pub status: Option<CodeStatus>,
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Clone, FromRow)]
pub struct ExportSource {
    #[sqlx(flatten)]
    pub code: RedemptionCode,
    pub application_name: Option<String>,
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    #[serde(flatten)]
    pub code: RedemptionCode,
    pub application_name: String,
    pub plan_name: String,
    pub uses: String,
    pub expiry: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RedemptionCodeUse {
    pub id: Uuid,
    pub redemption_code_id: Uuid,
    pub user_id: Uuid,
    pub membership_id: Option<Uuid>,
    pub redeemed_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RedemptionCodeUseRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub code_use: RedemptionCodeUse,
    pub user_email: Option<String>,
    pub user_full_name: Option<String>,
    pub membership_status: Option<String>,
    pub membership_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsesParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CodeTemplateInput {
        serde_json::from_value(serde_json::json!({
            "application_id": Uuid::new_v4().to_string(),
            "membership_plan_id": Uuid::new_v4().to_string(),
            "code_type": "batch",
        }))
        .unwrap()
    }

    #[test]
    fn template_defaults() {
        let template = input().validate().unwrap();
        assert_eq!(template.max_uses, 1);
        assert!(template.is_active);
        assert_eq!(template.status, CodeStatus::Active);
        assert_eq!(template.valid_until, None);
    }

    #[test]
    fn template_rejects_malformed_foreign_keys() {
        let mut bad = input();
        bad.membership_plan_id = "plan-1".into();
        let err = bad.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid membership plan id format");
    }

    #[test]
    fn blank_description_is_dropped() {
        let mut with_blank = input();
        with_blank.description = Some("  ".into());
        assert_eq!(with_blank.validate().unwrap().description, None);
    }

    #[test]
    fn create_request_flattens_template() {
        let req: CreateRedemptionCodeRequest = serde_json::from_value(serde_json::json!({
            "application_id": Uuid::new_v4().to_string(),
            "membership_plan_id": Uuid::new_v4().to_string(),
            "code_type": "single",
            "max_uses": -1,
            "auto_generate": true,
        }))
        .unwrap();
        assert!(req.auto_generate);
        assert_eq!(req.code, None);
        assert_eq!(req.template.max_uses, UNLIMITED_USES);
    }
}
