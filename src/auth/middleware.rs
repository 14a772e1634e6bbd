use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::error::AppError;
use crate::models::admin::Admin;
use crate::models::audit_log::AuditEntry;
use crate::services::admins;

use super::jwt;

pub const COOKIE_NAME: &str = "token";

/// An authenticated caller, carrying its `admins` row.
#[derive(Debug, Clone)]
pub struct AuthAdmin {
    pub admin: Admin,
    pub token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuthAdmin {
    /// Starts an audit entry attributed to this admin and request.
    pub fn audit(&self, action: &str) -> AuditEntry {
        AuditEntry {
            admin_id: self.admin.id.to_string(),
            action: action.to_string(),
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            ..Default::default()
        }
    }
}

fn header(parts: &Parts, name: impl axum::http::header::AsHeaderName) -> Option<&str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn bearer_token(parts: &Parts) -> Option<String> {
    header(parts, AUTHORIZATION)
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn client_ip(parts: &Parts) -> Option<String> {
    header(parts, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .or_else(|| header(parts, "x-real-ip"))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

impl FromRequestParts<AppState> for AuthAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized)?;

        let token = jar
            .get(COOKIE_NAME)
            .map(|c| c.value().to_string())
            .or_else(|| bearer_token(parts))
            .ok_or(AppError::Unauthorized)?;

        let claims = jwt::validate_token(&token, &state.config.auth)?;

        let admin = admins::get_admin(&state.db, claims.sub)
            .await?
            .ok_or(AppError::Forbidden)?;

        Ok(AuthAdmin {
            admin,
            token,
            ip_address: client_ip(parts),
            user_agent: header(parts, USER_AGENT).map(str::to_string),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::http::Request;
    use uuid::Uuid;

    use super::*;

    pub(crate) fn signed_in(email: &str) -> AuthAdmin {
        let now = chrono::Utc::now();
        AuthAdmin {
            admin: Admin {
                id: Uuid::new_v4(),
                auth_user_id: Uuid::new_v4(),
                email: email.into(),
                full_name: None,
                avatar_url: None,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
            token: "t".into(),
            ip_address: None,
            user_agent: None,
        }
    }

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut req = Request::builder().uri("/api/users");
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_header_is_read() {
        let p = parts(&[("authorization", "Bearer abc.def.ghi")]);
        assert_eq!(bearer_token(&p).as_deref(), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&parts(&[("authorization", "Basic xyz")])), None);
        assert_eq!(bearer_token(&parts(&[])), None);
    }

    #[test]
    fn forwarded_ip_takes_the_first_hop() {
        let p = parts(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(client_ip(&p).as_deref(), Some("203.0.113.7"));
        let p = parts(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&p).as_deref(), Some("198.51.100.2"));
        assert_eq!(client_ip(&parts(&[])), None);
    }

    #[test]
    fn audit_entries_carry_request_context() {
        let admin = AuthAdmin {
            ip_address: Some("203.0.113.7".into()),
            user_agent: Some("curl/8".into()),
            ..signed_in("admin@example.com")
        };
        let entry = admin.audit("DELETE_REDEMPTION_CODE");
        assert_eq!(entry.admin_id, admin.admin.id.to_string());
        assert_eq!(entry.action, "DELETE_REDEMPTION_CODE");
        assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8"));
    }
}
