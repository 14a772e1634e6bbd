use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde_json::json;

use crate::AppState;
use crate::auth::middleware::{AuthAdmin, COOKIE_NAME};
use crate::error::AppError;
use crate::models::admin::{Admin, LoginRequest};
use crate::services::admins;
use crate::validation::{ValidationError, is_valid_email};

const DEFAULT_SESSION_SECS: i64 = 3600;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

fn check_credentials(body: &LoginRequest) -> Result<String, ValidationError> {
    let email = body.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ValidationError::new("Invalid email format"));
    }
    if body.password.is_empty() {
        return Err(ValidationError::new("Password is required"));
    }
    Ok(email)
}

/// Signs in through the auth provider, then requires an `admins` row for the
/// returned user. Non-admin sessions are revoked straight away.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Admin>), AppError> {
    let email = check_credentials(&body)?;

    let session = state.auth.sign_in_with_password(&email, &body.password).await?;

    let Some(admin) = admins::get_admin(&state.db, session.user.id).await? else {
        if let Err(e) = state.auth.sign_out(&session.access_token).await {
            tracing::warn!(error = %e, "failed to revoke non-admin session");
        }
        let provider_email = session.user.email.as_deref().unwrap_or(&email);
        tracing::warn!(email = %provider_email, "sign-in by non-admin user refused");
        return Err(AppError::Forbidden);
    };

    let admin = admins::touch_last_login(&state.db, admin.id).await?;
    tracing::info!(admin_id = %admin.id, "admin signed in");

    let max_age = session.expires_in.unwrap_or(DEFAULT_SESSION_SECS);
    let cookie = build_auth_cookie(session.access_token, max_age);

    Ok((jar.add(cookie), Json(admin)))
}

async fn logout(
    State(state): State<AppState>,
    auth: AuthAdmin,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    state.auth.sign_out(&auth.token).await?;
    tracing::info!(admin_id = %auth.admin.id, email = %auth.admin.email, "admin signed out");
    Ok((
        jar.remove(Cookie::build(COOKIE_NAME).path("/")),
        Json(json!({ "signed_out": true })),
    ))
}

async fn me(auth: AuthAdmin) -> Json<Admin> {
    Json(auth.admin)
}

fn build_auth_cookie(token: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use super::*;
    use crate::routes::tests::send;

    fn login_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_email_never_reaches_the_provider() {
        let (status, body) =
            send(login_request(json!({ "email": "admin", "password": "pw" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email format");
    }

    #[tokio::test]
    async fn unreachable_provider_is_reported_as_bad_gateway() {
        let (status, _) = send(login_request(
            json!({ "email": "admin@example.com", "password": "pw" }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn credentials_are_normalized() {
        let body = LoginRequest {
            email: " Admin@Example.com ".into(),
            password: "pw".into(),
        };
        assert_eq!(check_credentials(&body).unwrap(), "admin@example.com");

        let empty = LoginRequest {
            email: "admin@example.com".into(),
            password: String::new(),
        };
        assert!(check_credentials(&empty).is_err());
    }

    #[tokio::test]
    async fn me_returns_the_admin_loaded_by_the_extractor() {
        let auth = crate::auth::middleware::tests::signed_in("ops@example.com");
        let id = auth.admin.id;
        let Json(admin) = me(auth).await;
        assert_eq!(admin.id, id);
        assert_eq!(admin.email, "ops@example.com");
    }

    #[test]
    fn auth_cookie_is_http_only() {
        let cookie = build_auth_cookie("a.b.c".into(), 3600);
        assert_eq!(cookie.name(), COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(1)));
    }
}
