pub mod admins;
pub mod app_config_templates;
pub mod app_configs;
pub mod app_versions;
pub mod applications;
pub mod audit;
pub mod dashboard;
pub mod membership_plans;
pub mod memberships;
pub mod payment_configs;
pub mod payments;
pub mod redemption_codes;
pub mod users;

use sqlx::postgres::PgRow;
use sqlx::{Encode, FromRow, PgPool, Postgres, QueryBuilder, Type};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Page, Paginated};
use crate::validation::ValidationError;

/// Builds `UPDATE {table} SET a = $1, b = $2 ... WHERE id = $n RETURNING *`
/// from the fields that are present in a partial update.
pub struct Assignments<'a> {
    qb: QueryBuilder<'a, Postgres>,
    fields: usize,
    touched: bool,
}

impl<'a> Assignments<'a> {
    pub fn new(table: &str) -> Self {
        Self {
            qb: QueryBuilder::new(format!("UPDATE {table} SET ")),
            fields: 0,
            touched: false,
        }
    }

    fn column(&mut self, column: &str) -> &mut QueryBuilder<'a, Postgres> {
        if self.fields > 0 {
            self.qb.push(", ");
        }
        self.fields += 1;
        self.qb.push(column).push(" = ")
    }

    /// Assigns `column` when `value` is present.
    pub fn set<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'a + Encode<'a, Postgres> + Type<Postgres> + Send,
    {
        if let Some(value) = value {
            self.column(column).push_bind(value);
        }
        self
    }

    /// Assigns a nullable column: `Some(None)` writes `NULL`.
    pub fn set_nullable<T>(&mut self, column: &str, value: Option<Option<T>>) -> &mut Self
    where
        T: 'a + Encode<'a, Postgres> + Type<Postgres> + Send,
    {
        if let Some(value) = value {
            self.column(column).push_bind(value);
        }
        self
    }

    /// Also sets `updated_at = now()` when the update is not empty.
    pub fn touch(&mut self) -> &mut Self {
        self.touched = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields == 0
    }

    pub fn finish(mut self, id: Uuid) -> Result<QueryBuilder<'a, Postgres>, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new("No fields to update"));
        }
        if self.touched {
            self.qb.push(", updated_at = now()");
        }
        self.qb
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING *");
        Ok(self.qb)
    }
}

/// Runs an update built with [`Assignments`], mapping a missing row to 404.
pub async fn apply_update<T>(
    pool: &PgPool,
    update: Assignments<'_>,
    id: Uuid,
    what: &str,
) -> Result<T, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut qb = update.finish(id)?;
    qb.build_query_as::<T>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(what))
}

/// Runs a filtered count and the matching page of rows concurrently.
/// `rows` gets `LIMIT`/`OFFSET` appended.
pub async fn fetch_page<T>(
    pool: &PgPool,
    page: Page,
    mut count: QueryBuilder<'_, Postgres>,
    mut rows: QueryBuilder<'_, Postgres>,
) -> Result<Paginated<T>, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    rows.push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let (total, data) = tokio::try_join!(
        count.build_query_scalar::<i64>().fetch_one(pool),
        rows.build_query_as::<T>().fetch_all(pool),
    )?;

    Ok(page.wrap(data, total))
}

pub async fn delete_by_id(pool: &PgPool, table: &str, id: Uuid, what: &str) -> Result<(), AppError> {
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(what));
    }
    Ok(())
}
