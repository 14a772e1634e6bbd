use std::future::Future;

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Assignments, apply_update, delete_by_id, fetch_page};
use crate::error::AppError;
use crate::ids::generate_redemption_code;
use crate::models::redemption_code::{
    CodeStats, CodeStatus, CodeTemplate, CreateRedemptionCodeRequest, ExportFilters, ExportRow,
    ExportSource, MAX_MANUAL_CODE_LEN, NewRedemptionCode, RedemptionCode, RedemptionCodeFilters,
    RedemptionCodeRow, RedemptionCodeUseRow, UpdateRedemptionCodeRequest,
};
use crate::models::{Page, Paginated};
use crate::validation::{ValidationError, like_pattern, normalize_search, parse_uuid};

const WHAT: &str = "Redemption code";

/// Shown in exports for codes without `valid_until`.
pub const NO_EXPIRY: &str = "永久有效";
const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const JOINED_SELECT: &str = "SELECT rc.*,
        a.name AS application_name, a.slug AS application_slug,
        mp.plan_id AS plan_key, mp.display_name AS plan_display_name,
        mp.price AS plan_price, mp.currency AS plan_currency,
        mp.duration_days AS plan_duration_days
     FROM redemption_codes rc
     LEFT JOIN applications a ON a.id = rc.application_id
     LEFT JOIN membership_plans mp ON mp.id = rc.membership_plan_id";

const INSERT_HEAD: &str = "INSERT INTO redemption_codes (code, code_type, application_id, \
     membership_plan_id, max_uses, current_uses, valid_from, valid_until, is_active, status, \
     description, metadata, created_by) ";

fn manual_code(code: Option<&str>) -> Result<String, ValidationError> {
    let code = code.map(str::trim).unwrap_or_default();
    if code.is_empty() {
        return Err(ValidationError::new("Code is required unless auto_generate is set"));
    }
    if code.chars().count() > MAX_MANUAL_CODE_LEN {
        return Err(ValidationError(format!(
            "Code must be at most {MAX_MANUAL_CODE_LEN} characters"
        )));
    }
    Ok(code.to_string())
}

/// `count` rows sharing `template`, each with a freshly generated code.
pub fn build_batch(
    count: usize,
    template: &CodeTemplate,
    created_by: Option<Uuid>,
) -> Vec<NewRedemptionCode> {
    (0..count)
        .map(|_| NewRedemptionCode {
            code: generate_redemption_code(),
            template: template.clone(),
            current_uses: 0,
            created_by,
        })
        .collect()
}

async fn insert_codes(
    pool: &PgPool,
    codes: Vec<NewRedemptionCode>,
) -> Result<Vec<RedemptionCode>, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new(INSERT_HEAD);
    qb.push_values(codes, |mut row, new| {
        let t = new.template;
        row.push_bind(new.code)
            .push_bind(t.code_type)
            .push_bind(t.application_id)
            .push_bind(t.membership_plan_id)
            .push_bind(t.max_uses)
            .push_bind(new.current_uses)
            .push_bind(t.valid_from)
            .push_bind(t.valid_until)
            .push_bind(t.is_active)
            .push_bind(t.status)
            .push_bind(t.description)
            .push_bind(t.metadata)
            .push_bind(new.created_by);
    });
    qb.push(" RETURNING *");

    Ok(qb
        .build_query_as::<RedemptionCode>()
        .fetch_all(pool)
        .await?)
}

pub async fn create(
    pool: &PgPool,
    req: CreateRedemptionCodeRequest,
    admin_id: Uuid,
) -> Result<RedemptionCode, AppError> {
    let code = if req.auto_generate {
        generate_redemption_code()
    } else {
        manual_code(req.code.as_deref())?
    };
    let template = req.template.validate()?;

    let mut created = insert_codes(
        pool,
        vec![NewRedemptionCode {
            code,
            template,
            current_uses: 0,
            created_by: Some(admin_id),
        }],
    )
    .await?;

    created
        .pop()
        .ok_or_else(|| AppError::Internal("insert returned no row".into()))
}

/// Inserts all codes in one statement; either every row lands or none does.
pub async fn batch_create(
    pool: &PgPool,
    count: usize,
    template: CodeTemplate,
    admin_id: Uuid,
) -> Result<Vec<RedemptionCode>, AppError> {
    let codes = build_batch(count, &template, Some(admin_id));
    let created = insert_codes(pool, codes).await?;
    tracing::info!(count = created.len(), application_id = %template.application_id, "batch issued redemption codes");
    Ok(created)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    req: UpdateRedemptionCodeRequest,
) -> Result<RedemptionCode, AppError> {
    let code = match req.code {
        Some(code) => Some(manual_code(Some(code.as_str()))?),
        None => None,
    };
    let application_id = req
        .application_id
        .map(|s| parse_uuid(&s, "application"))
        .transpose()?;
    let membership_plan_id = req
        .membership_plan_id
        .map(|s| parse_uuid(&s, "membership plan"))
        .transpose()?;

    let mut update = Assignments::new("redemption_codes");
    update
        .set("code", code)
        .set("code_type", req.code_type)
        .set("application_id", application_id)
        .set("membership_plan_id", membership_plan_id)
        .set("max_uses", req.max_uses)
        .set("current_uses", req.current_uses)
        .set("valid_from", req.valid_from)
        .set_nullable("valid_until", req.valid_until)
        .set("is_active", req.is_active)
        .set("status", req.status)
        .set_nullable("description", req.description)
        .set_nullable("metadata", req.metadata)
        .touch();

    apply_update(pool, update, id, WHAT).await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    delete_by_id(pool, "redemption_codes", id, WHAT).await
}

fn filtered(head: &str, filters: &RedemptionCodeFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(" WHERE 1=1");
    if let Some(application_id) = filters.application_id {
        qb.push(" AND rc.application_id = ").push_bind(application_id);
    }
    if let Some(status) = filters.status {
        qb.push(" AND rc.status = ").push_bind(status);
    }
    if let Some(code_type) = filters.code_type {
        qb.push(" AND rc.code_type = ").push_bind(code_type);
    }
    if let Some(search) = normalize_search(filters.search.as_deref()) {
        let pattern = like_pattern(&search);
        qb.push(" AND (rc.code ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR rc.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb
}

pub async fn list(
    pool: &PgPool,
    filters: &RedemptionCodeFilters,
) -> Result<Paginated<RedemptionCodeRow>, AppError> {
    let page = Page::new(filters.page, filters.page_size);
    let count = filtered("SELECT COUNT(*) FROM redemption_codes rc", filters);
    let mut rows = filtered(JOINED_SELECT, filters);
    rows.push(" ORDER BY rc.created_at DESC");

    fetch_page(pool, page, count, rows).await
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<RedemptionCodeRow, AppError> {
    sqlx::query_as::<_, RedemptionCodeRow>(&format!("{JOINED_SELECT} WHERE rc.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(WHAT))
}

pub async fn uses(
    pool: &PgPool,
    code_id: Uuid,
    page: Page,
) -> Result<Paginated<RedemptionCodeUseRow>, AppError> {
    let mut count =
        QueryBuilder::new("SELECT COUNT(*) FROM redemption_code_uses WHERE redemption_code_id = ");
    count.push_bind(code_id);

    let mut rows = QueryBuilder::new(
        "SELECT u.*,
            us.email AS user_email, us.full_name AS user_full_name,
            m.status AS membership_status, m.expires_at AS membership_expires_at
         FROM redemption_code_uses u
         LEFT JOIN users us ON us.id = u.user_id
         LEFT JOIN user_app_memberships m ON m.id = u.membership_id
         WHERE u.redemption_code_id = ",
    );
    rows.push_bind(code_id).push(" ORDER BY u.redeemed_at DESC");

    fetch_page(pool, page, count, rows).await
}

/// Runs the four counts concurrently. The counts are independent reads, so
/// they need not agree with each other under concurrent writes.
pub async fn aggregate_stats<F, Fut>(count: F) -> Result<CodeStats, AppError>
where
    F: Fn(Option<CodeStatus>) -> Fut,
    Fut: Future<Output = Result<i64, AppError>>,
{
    let (total, active, expired, exhausted) = tokio::try_join!(
        count(None),
        count(Some(CodeStatus::Active)),
        count(Some(CodeStatus::Expired)),
        count(Some(CodeStatus::Exhausted)),
    )?;

    Ok(CodeStats {
        total,
        active,
        expired,
        exhausted,
    })
}

async fn count_codes(
    pool: &PgPool,
    application_id: Option<Uuid>,
    status: Option<CodeStatus>,
) -> Result<i64, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM redemption_codes WHERE 1=1");
    if let Some(application_id) = application_id {
        qb.push(" AND application_id = ").push_bind(application_id);
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

pub async fn stats(pool: &PgPool, application_id: Option<Uuid>) -> Result<CodeStats, AppError> {
    aggregate_stats(|status| count_codes(pool, application_id, status)).await
}

/// Every filter narrows the unfiltered query with an extra `AND` predicate.
pub fn export_query(filters: &ExportFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT rc.*, a.name AS application_name, mp.display_name AS plan_name
         FROM redemption_codes rc
         LEFT JOIN applications a ON a.id = rc.application_id
         LEFT JOIN membership_plans mp ON mp.id = rc.membership_plan_id
         WHERE 1=1",
    );
    if let Some(application_id) = filters.application_id {
        qb.push(" AND rc.application_id = ").push_bind(application_id);
    }
    if let Some(status) = filters.status {
        qb.push(" AND rc.status = ").push_bind(status);
    }
    qb.push(" ORDER BY rc.created_at DESC");
    qb
}

pub fn format_expiry(valid_until: Option<DateTime<Utc>>, offset: &FixedOffset) -> String {
    match valid_until {
        Some(at) => at.with_timezone(offset).format(EXPIRY_FORMAT).to_string(),
        None => NO_EXPIRY.to_string(),
    }
}

pub fn export_row(source: ExportSource, offset: &FixedOffset) -> ExportRow {
    ExportRow {
        uses: source.code.uses_label(),
        expiry: format_expiry(source.code.valid_until, offset),
        application_name: source.application_name.unwrap_or_else(|| "-".into()),
        plan_name: source.plan_name.unwrap_or_else(|| "-".into()),
        code: source.code,
    }
}

/// `code \t application \t plan \t expiry`
pub fn format_export_line(row: &ExportRow) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        row.code.code, row.application_name, row.plan_name, row.expiry
    )
}

/// All matching codes, newest first, without pagination.
pub async fn export(
    pool: &PgPool,
    filters: &ExportFilters,
    offset: &FixedOffset,
) -> Result<Vec<ExportRow>, AppError> {
    let sources = export_query(filters)
        .build_query_as::<ExportSource>()
        .fetch_all(pool)
        .await?;

    Ok(sources
        .into_iter()
        .map(|source| export_row(source, offset))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;
    use crate::models::redemption_code::{CodeTemplateInput, CodeType, UNLIMITED_USES};

    fn template() -> CodeTemplate {
        let input: CodeTemplateInput = serde_json::from_value(serde_json::json!({
            "application_id": Uuid::new_v4().to_string(),
            "membership_plan_id": Uuid::new_v4().to_string(),
            "code_type": "batch",
            "max_uses": 1,
        }))
        .unwrap();
        input.validate().unwrap()
    }

    fn stored(new: NewRedemptionCode) -> RedemptionCode {
        let t = new.template;
        RedemptionCode {
            id: Uuid::new_v4(),
            code: new.code,
            code_type: t.code_type,
            application_id: t.application_id,
            membership_plan_id: t.membership_plan_id,
            max_uses: t.max_uses,
            current_uses: new.current_uses,
            valid_from: t.valid_from,
            valid_until: t.valid_until,
            is_active: t.is_active,
            status: t.status,
            description: t.description,
            metadata: t.metadata,
            created_by: new.created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn code_shape(code: &str) -> bool {
        code.len() == 19
            && code.split('-').count() == 4
            && code
                .split('-')
                .all(|g| g.len() == 4 && g.bytes().all(|b| crate::ids::CODE_ALPHABET.contains(&b)))
    }

    #[test]
    fn batch_shares_template_and_starts_unused() {
        let template = template();
        let admin = Uuid::new_v4();
        let batch = build_batch(5, &template, Some(admin));

        assert_eq!(batch.len(), 5);
        let distinct: HashSet<_> = batch.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(distinct.len(), 5);
        for code in &batch {
            assert!(code_shape(&code.code), "{}", code.code);
            assert_eq!(code.template, template);
            assert_eq!(code.current_uses, 0);
            assert_eq!(code.created_by, Some(admin));
        }
    }

    #[test]
    fn batch_without_expiry_exports_as_permanent() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let rows: Vec<ExportRow> = build_batch(5, &template(), None)
            .into_iter()
            .map(|new| {
                export_row(
                    ExportSource {
                        code: stored(new),
                        application_name: Some("Notes".into()),
                        plan_name: None,
                    },
                    &offset,
                )
            })
            .collect();

        for row in &rows {
            assert_eq!(row.expiry, NO_EXPIRY);
            assert_eq!(row.plan_name, "-");
            assert_eq!(row.uses, "0 / 1");
            assert!(format_export_line(row).ends_with("\tNotes\t-\t永久有效"));
        }
    }

    #[test]
    fn expiry_uses_display_offset() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 20, 30, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let shanghai = FixedOffset::east_opt(8 * 3600).unwrap();

        assert_eq!(format_expiry(Some(at), &utc), "2024-12-31 20:30:00");
        assert_eq!(format_expiry(Some(at), &shanghai), "2025-01-01 04:30:00");
    }

    #[test]
    fn export_line_is_tab_separated() {
        let mut new = build_batch(1, &template(), None).remove(0);
        new.code = "ABCD-EFGH-JKLM-NPQR".into();
        new.template.max_uses = UNLIMITED_USES;
        let row = export_row(
            ExportSource {
                code: stored(new),
                application_name: None,
                plan_name: Some("Pro".into()),
            },
            &FixedOffset::east_opt(0).unwrap(),
        );
        assert_eq!(format_export_line(&row), "ABCD-EFGH-JKLM-NPQR\t-\tPro\t永久有效");
        assert_eq!(row.uses, "0 / ∞");
    }

    #[test]
    fn filtered_export_narrows_unfiltered_export() {
        const ORDER: &str = " ORDER BY rc.created_at DESC";
        let all = export_query(&ExportFilters::default());
        let base = all.sql().strip_suffix(ORDER).unwrap().to_string();

        let filtered = export_query(&ExportFilters {
            application_id: Some(Uuid::new_v4()),
            status: Some(CodeStatus::Active),
            ..Default::default()
        });
        let sql = filtered.sql();

        let extra = sql
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_suffix(ORDER))
            .unwrap();
        assert_eq!(extra, " AND rc.application_id = $1 AND rc.status = $2");
    }

    #[test]
    fn manual_codes_are_trimmed_and_bounded() {
        assert_eq!(manual_code(Some("  VIP2024 ")).unwrap(), "VIP2024");
        assert!(manual_code(Some("   ")).is_err());
        assert!(manual_code(None).is_err());
        assert!(manual_code(Some("A".repeat(33).as_str())).is_err());
    }

    #[test]
    fn list_filters_share_where_clause() {
        let filters = RedemptionCodeFilters {
            code_type: Some(CodeType::Single),
            search: Some("50%".into()),
            ..Default::default()
        };
        let count = filtered("SELECT COUNT(*) FROM redemption_codes rc", &filters);
        assert_eq!(
            count.sql(),
            "SELECT COUNT(*) FROM redemption_codes rc WHERE 1=1 AND rc.code_type = $1 \
             AND (rc.code ILIKE $2 OR rc.description ILIKE $3)"
        );
    }

    async fn count_in(codes: &[CodeStatus], status: Option<CodeStatus>) -> Result<i64, AppError> {
        Ok(codes
            .iter()
            .filter(|s| status.is_none_or(|want| **s == want))
            .count() as i64)
    }

    #[tokio::test]
    async fn stats_for_empty_application_are_zero() {
        let stats = aggregate_stats(|status| count_in(&[], status)).await.unwrap();
        assert_eq!(stats, CodeStats::default());
    }

    #[tokio::test]
    async fn stats_count_each_status() {
        use CodeStatus::*;
        let codes = [Active, Active, Expired, Disabled, Exhausted, Active];
        let stats = aggregate_stats(|status| count_in(&codes, status)).await.unwrap();
        assert_eq!(
            stats,
            CodeStats {
                total: 6,
                active: 3,
                expired: 1,
                exhausted: 1,
            }
        );
    }

    #[tokio::test]
    async fn stats_fail_when_any_count_fails() {
        let result = aggregate_stats(|status| async move {
            match status {
                Some(CodeStatus::Expired) => Err(AppError::Internal("boom".into())),
                _ => Ok(1),
            }
        })
        .await;
        assert!(result.is_err());
    }

    fn status_strategy() -> impl Strategy<Value = CodeStatus> {
        prop_oneof![
            Just(CodeStatus::Active),
            Just(CodeStatus::Expired),
            Just(CodeStatus::Exhausted),
            Just(CodeStatus::Disabled),
        ]
    }

    proptest! {
        #[test]
        fn stat_buckets_never_exceed_total(codes in prop::collection::vec(status_strategy(), 0..64)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let stats = rt
                .block_on(aggregate_stats(|status| count_in(&codes, status)))
                .unwrap();
            prop_assert!(stats.active + stats.expired + stats.exhausted <= stats.total);
            prop_assert_eq!(stats.total, codes.len() as i64);
        }

        #[test]
        fn build_batch_yields_requested_count(count in 0usize..40) {
            let batch = build_batch(count, &template(), None);
            prop_assert_eq!(batch.len(), count);
            prop_assert!(batch.iter().all(|c| code_shape(&c.code)));
        }
    }
}
