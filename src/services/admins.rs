use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::admin::Admin;
use crate::validation::{ValidationError, is_valid_email};

/// `None` when the auth user has no admin row.
pub async fn get_admin(pool: &PgPool, auth_user_id: Uuid) -> Result<Option<Admin>, AppError> {
    let admin = sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE auth_user_id = $1")
        .bind(auth_user_id)
        .fetch_optional(pool)
        .await?;

    Ok(admin)
}

pub async fn touch_last_login(pool: &PgPool, admin_id: Uuid) -> Result<Admin, AppError> {
    sqlx::query_as::<_, Admin>(
        "UPDATE admins SET last_login_at = now(), updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(admin_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Admin"))
}

/// Creates the admin row for an auth user, or refreshes its email and name.
pub async fn grant(
    pool: &PgPool,
    auth_user_id: Uuid,
    email: &str,
    full_name: Option<&str>,
) -> Result<Admin, AppError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ValidationError::new("Invalid email format").into());
    }

    let admin = sqlx::query_as::<_, Admin>(
        "INSERT INTO admins (auth_user_id, email, full_name)
         VALUES ($1, $2, $3)
         ON CONFLICT (auth_user_id)
         DO UPDATE SET email = EXCLUDED.email,
                       full_name = COALESCE(EXCLUDED.full_name, admins.full_name),
                       updated_at = now()
         RETURNING *",
    )
    .bind(auth_user_id)
    .bind(&email)
    .bind(full_name)
    .fetch_one(pool)
    .await?;

    Ok(admin)
}
