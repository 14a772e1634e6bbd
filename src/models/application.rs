use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::nullable;

/// A tenant product sharing the back-office.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub app_key: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationFilters {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateApplicationRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub website_url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

pub(crate) fn default_true() -> bool {
    true
}
