use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, fetch_page};
use crate::error::AppError;
use crate::models::user::{UpdateUserRequest, User, UserFilters, UserRow};
use crate::models::{Page, Paginated};
use crate::validation::{ValidationError, is_valid_email, like_pattern, normalize_search};

const WHAT: &str = "User";

const JOINED_SELECT: &str = "SELECT u.*, a.name AS application_name, a.slug AS application_slug
     FROM users u
     LEFT JOIN applications a ON a.id = u.registered_from_app_id";

fn filtered(head: &str, filters: &UserFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(search) = normalize_search(filters.search.as_deref()) {
        let pattern = like_pattern(&search);
        qb.push(" AND (u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.full_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(application_id) = filters.application_id {
        qb.push(" AND u.registered_from_app_id = ")
            .push_bind(application_id);
    }
    qb
}

pub async fn list(pool: &PgPool, filters: &UserFilters) -> Result<Paginated<UserRow>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM users u", filters);
    let mut rows = filtered(JOINED_SELECT, filters);
    rows.push(" ORDER BY u.created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>(&format!("{JOINED_SELECT} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn update(pool: &PgPool, id: Uuid, req: UpdateUserRequest) -> Result<User, AppError> {
    let email = match req.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ValidationError::new("Invalid email format").into());
            }
            Some(email)
        }
        None => None,
    };

    let mut update = Assignments::new("users");
    update
        .set("email", email)
        .set_nullable("full_name", req.full_name)
        .set_nullable("avatar_url", req.avatar_url)
        .set("is_banned", req.is_banned)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn set_banned(pool: &PgPool, id: Uuid, is_banned: bool) -> Result<User, AppError> {
    let mut update = Assignments::new("users");
    update.set("is_banned", Some(is_banned)).touch();
    apply_update(pool, update, id, WHAT).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_and_application_filters() {
        let qb = filtered(
            "SELECT COUNT(*) FROM users u",
            &UserFilters {
                search: Some("alice".into()),
                application_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        );
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM users u WHERE 1=1 AND (u.email ILIKE $1 OR u.full_name ILIKE $2) \
             AND u.registered_from_app_id = $3"
        );
    }

    #[test]
    fn no_filters_selects_everything() {
        let qb = filtered("SELECT COUNT(*) FROM users u", &UserFilters::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM users u WHERE 1=1");
    }
}
