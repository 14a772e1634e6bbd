use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_AUDIT_LIMIT: i64 = 50;
pub const DEFAULT_RECENT_LIMIT: i64 = 20;
pub const MAX_AUDIT_LIMIT: i64 = 100;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub admin_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub target_user_email: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An administrative action about to be recorded. Ids are kept as strings so
/// the audit service can validate them itself.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub admin_id: String,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub target_user_id: Option<String>,
    pub target_user_email: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    pub fn resource(mut self, resource_type: &str, id: Uuid) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(id);
        self
    }

    pub fn target_user(mut self, id: Uuid, email: &str) -> Self {
        self.target_user_id = Some(id.to_string());
        self.target_user_email = Some(email.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditLogFilters {
    pub admin_id: Option<String>,
    pub action: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
    pub data: Vec<AuditLog>,
    pub count: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// Clamps a requested limit to `1..=100`, using `default` when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.filter(|l| *l > 0).unwrap_or(default).min(MAX_AUDIT_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_capped() {
        assert_eq!(clamp_limit(None, DEFAULT_AUDIT_LIMIT), 50);
        assert_eq!(clamp_limit(Some(500), DEFAULT_AUDIT_LIMIT), 100);
        assert_eq!(clamp_limit(Some(0), DEFAULT_RECENT_LIMIT), 20);
        assert_eq!(clamp_limit(Some(7), DEFAULT_RECENT_LIMIT), 7);
    }

    #[test]
    fn entry_builder_fills_resource_and_target() {
        let code_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let entry = AuditEntry::default()
            .resource("redemption_code", code_id)
            .target_user(user_id, "user@example.com")
            .details(serde_json::json!({ "count": 5 }));

        assert_eq!(entry.resource_type.as_deref(), Some("redemption_code"));
        assert_eq!(entry.resource_id, Some(code_id));
        assert_eq!(entry.target_user_id, Some(user_id.to_string()));
        assert_eq!(entry.details, Some(serde_json::json!({ "count": 5 })));
    }
}
