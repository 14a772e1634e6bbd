use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::nullable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Windows,
    Macos,
    Linux,
    Web,
    All,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppVersion {
    pub id: Uuid,
    pub application_id: Uuid,
    pub version_number: String,
    pub version_code: i32,
    pub release_notes: Option<String>,
    pub download_url: Option<String>,
    pub file_size: Option<i64>,
    pub file_hash: Option<String>,
    pub min_supported_version: Option<String>,
    pub is_force_update: bool,
    pub is_published: bool,
    pub platform: Platform,
    pub metadata: Option<serde_json::Value>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppVersionRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub version: AppVersion,
    pub application_name: Option<String>,
    pub application_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppVersionFilters {
    pub application_id: Option<Uuid>,
    pub platform: Option<Platform>,
    pub is_published: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatestVersionParams {
    pub application_id: Uuid,
    pub platform: Platform,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppVersionRequest {
    pub application_id: Uuid,
    pub version_number: String,
    pub version_code: i32,
    pub release_notes: Option<String>,
    pub download_url: Option<String>,
    pub file_size: Option<i64>,
    pub file_hash: Option<String>,
    pub min_supported_version: Option<String>,
    #[serde(default)]
    pub is_force_update: bool,
    #[serde(default)]
    pub is_published: bool,
    pub platform: Platform,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppVersionRequest {
    pub version_number: Option<String>,
    pub version_code: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub release_notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub download_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub file_size: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub file_hash: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub min_supported_version: Option<Option<String>>,
    pub is_force_update: Option<bool>,
    pub platform: Option<Platform>,
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: Option<Option<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SetPublishedRequest {
    pub is_published: bool,
}
