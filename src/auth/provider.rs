//! Client for the GoTrue-compatible auth provider that owns admin credentials.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ProviderUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: ProviderUser,
}

#[derive(Clone)]
pub struct AuthProvider {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthProvider {
    pub fn new(config: &AuthConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
        })
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let resp = self
            .client
            .post(format!("{}/token?grant_type=password", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(resp.json::<Session>().await?),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(AppError::InvalidCredentials),
            s => Err(AppError::AuthProvider(format!("sign-in returned {s}"))),
        }
    }

    /// Revokes the session behind `access_token`. An already expired session
    /// counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let resp = self
            .client
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() || s == StatusCode::UNAUTHORIZED => Ok(()),
            s => Err(AppError::AuthProvider(format!("sign-out returned {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_parses_provider_reply() {
        let session: Session = serde_json::from_str(&format!(
            r#"{{"access_token":"a.b.c","token_type":"bearer","expires_in":3600,
                "refresh_token":"r","user":{{"id":"{}","email":"admin@example.com","aud":"authenticated"}}}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(session.access_token, "a.b.c");
        assert_eq!(session.expires_in, Some(3600));
        assert_eq!(session.user.email.as_deref(), Some("admin@example.com"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_gateway_error() {
        let provider = AuthProvider::new(&AuthConfig {
            url: "http://127.0.0.1:1".into(),
            anon_key: String::new(),
            jwt_secret: String::new(),
            jwt_audience: "authenticated".into(),
            timeout: std::time::Duration::from_millis(500),
        })
        .unwrap();

        let err = provider
            .sign_in_with_password("admin@example.com", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthProvider(_)));
    }
}
