pub mod app_config_templates;
pub mod app_configs;
pub mod app_versions;
pub mod applications;
pub mod audit_logs;
pub mod auth;
pub mod dashboard;
pub mod membership_plans;
pub mod memberships;
pub mod payment_configs;
pub mod payments;
pub mod redemption_codes;
pub mod users;

use std::marker::PhantomData;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::models::audit_log::AuditEntry;
use crate::services::audit;
use crate::validation::parse_uuid;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .merge(auth::router())
        .merge(applications::router())
        .merge(app_versions::router())
        .merge(users::router())
        .merge(memberships::router())
        .merge(membership_plans::router())
        .merge(payment_configs::router())
        .merge(payments::router())
        .merge(redemption_codes::router())
        .merge(audit_logs::router())
        .merge(app_configs::router())
        .merge(app_config_templates::router())
        .merge(dashboard::router())
}

/// The full application: API routes, CORS, request tracing and state.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_allow_origin.as_deref());
    api_router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        Err(_) => {
            tracing::warn!(origin, "invalid CORS_ALLOW_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .map(|one| one == 1)
        .unwrap_or(false);
    Json(serde_json::json!({ "status": "ok", "db": db }))
}

/// Names the entity behind an `{id}` path segment in error messages.
pub trait Resource {
    const LABEL: &'static str;
}

/// A path `{id}` that has been checked to be a v4 UUID. Listed before
/// `AuthAdmin` in handler arguments so a malformed id never reaches the
/// database.
pub struct Id<R>(pub Uuid, PhantomData<R>);

impl<R> Id<R> {
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl<S, R> FromRequestParts<S> for Id<R>
where
    S: Send + Sync,
    R: Resource,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Id(parse_uuid(&raw, R::LABEL)?, PhantomData))
    }
}

/// Parses a request body kept as raw JSON so the audit trail can record the
/// fields exactly as submitted.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(body.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

/// Writes the audit entry for a committed mutation and drops cached reads of
/// every entity it touched.
pub(crate) async fn after_mutation(state: &AppState, entry: AuditEntry, entities: &[&str]) {
    audit::record(&state.db, entry).await;
    for entity in entities {
        state.cache.invalidate(entity);
    }
    state.cache.invalidate(audit_logs::ENTITY);
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::jwt::create_token;
    use crate::auth::provider::AuthProvider;
    use crate::cache::QueryCache;
    use crate::config::Config;

    /// State whose pool never connects; requests that reach the database fail.
    pub(crate) fn test_state() -> AppState {
        let mut config = Config::from_env();
        config.database_url = "postgres://nobody@127.0.0.1:1/none".into();
        config.auth.url = "http://127.0.0.1:1".into();
        config.auth.jwt_secret = "router-test-secret".into();
        config.cors_allow_origin = None;

        let db = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(&config.database_url)
            .unwrap();
        let auth = AuthProvider::new(&config.auth).unwrap();

        AppState {
            db,
            cache: Arc::new(QueryCache::new(config.cache_ttl, config.cache_max_entries)),
            auth,
            config: Arc::new(config),
        }
    }

    pub(crate) async fn send(req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(test_state()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        for uri in [
            "/api/redemption-codes",
            "/api/redemption-codes/stats",
            "/api/redemption-codes/export?format=tsv",
            "/api/users",
            "/api/audit-logs/recent",
            "/api/dashboard/stats",
            "/api/auth/me",
        ] {
            let (status, body) = send(get(uri)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Authentication required", "{uri}");
        }
    }

    #[tokio::test]
    async fn tokens_from_another_issuer_are_rejected() {
        let mut other = test_state().config.auth.clone();
        other.jwt_secret = "someone-else".into();
        let token = create_token(Uuid::new_v4(), "admin@example.com", &other);

        let req = Request::builder()
            .uri("/api/applications")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_the_database() {
        let cases = [
            ("/api/redemption-codes/abc", "Invalid redemption code id format"),
            ("/api/redemption-codes/abc/uses", "Invalid redemption code id format"),
            ("/api/users/6fa459ea-ee8a-11ca-a4d1-0800200c9a66", "Invalid user id format"),
            ("/api/applications/1", "Invalid application id format"),
            ("/api/membership-plans/x", "Invalid membership plan id format"),
        ];
        for (uri, message) in cases {
            let (status, body) = send(get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], message, "{uri}");
        }
    }

    #[tokio::test]
    async fn health_reports_database_state() {
        let (status, body) = send(get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db"], false);
    }

    #[test]
    fn cors_falls_back_to_permissive() {
        // Both paths must build without panicking.
        let _ = cors_layer(Some("https://admin.example.com"));
        let _ = cors_layer(Some("bad\norigin"));
        let _ = cors_layer(None);
    }

    #[test]
    fn body_errors_are_bad_requests() {
        let err = parse_body::<crate::models::user::UpdateUserRequest>(&serde_json::json!({
            "is_banned": "yes"
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
