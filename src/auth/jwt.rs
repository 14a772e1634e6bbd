use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AppError;

/// Access-token claims issued by the auth provider. `sub` is the auth user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn validate_token(token: &str, config: &AuthConfig) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.as_str()]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected access token");
        AppError::Unauthorized
    })
}

#[cfg(test)]
pub fn create_token(auth_user_id: Uuid, email: &str, config: &AuthConfig) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = chrono::Utc::now();
    let claims = Claims {
        sub: auth_user_id,
        email: Some(email.to_string()),
        role: Some("authenticated".into()),
        aud: config.jwt_audience.clone(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            url: "http://localhost:9999".into(),
            anon_key: String::new(),
            jwt_secret: "test-secret".into(),
            jwt_audience: "authenticated".into(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn provider_tokens_round_trip() {
        let id = Uuid::new_v4();
        let token = create_token(id, "admin@example.com", &config());
        let claims = validate_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email.as_deref(), Some("admin@example.com"));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = create_token(Uuid::new_v4(), "admin@example.com", &config());
        let mut other = config();
        other.jwt_secret = "another-secret".into();
        assert!(matches!(
            validate_token(&token, &other),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_audience_is_unauthorized() {
        let token = create_token(Uuid::new_v4(), "admin@example.com", &config());
        let mut other = config();
        other.jwt_audience = "service_role".into();
        assert!(validate_token(&token, &other).is_err());
    }

    #[test]
    fn garbage_is_unauthorized() {
        assert!(validate_token("not.a.jwt", &config()).is_err());
    }
}
