use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

static UUID_V4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("static regex is valid")
});

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex is valid"));

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("static regex is valid"));

static APP_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ak_[a-zA-Z0-9]{32}$").expect("static regex is valid"));

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;

/// Input rejected before anything is sent to the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Accepts only RFC 4122 version 4 UUIDs in hyphenated form, any case.
pub fn is_valid_uuid(s: &str) -> bool {
    UUID_V4_RE.is_match(s)
}

pub fn parse_uuid(s: &str, what: &str) -> Result<Uuid, ValidationError> {
    if !is_valid_uuid(s) {
        return Err(ValidationError(format!("Invalid {what} id format")));
    }
    Uuid::parse_str(s).map_err(|_| ValidationError(format!("Invalid {what} id format")))
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

/// Only absolute http(s) URLs pass.
pub fn is_valid_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    (3..=100).contains(&slug.len()) && SLUG_RE.is_match(slug)
}

pub fn is_valid_app_key(app_key: &str) -> bool {
    APP_KEY_RE.is_match(app_key)
}

/// Strips angle brackets, trims and caps the result at 1000 characters.
pub fn sanitize_string(input: &str) -> String {
    input
        .replace(['<', '>'], "")
        .trim()
        .chars()
        .take(1000)
        .collect()
}

/// Builds an `ILIKE` pattern matching `term` anywhere, with wildcards in the
/// term itself escaped.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Returns `(page, page_size)` with 1 <= page <= 1_000_000 and
/// 1 <= page_size <= 100.
pub fn clamp_pagination(page: Option<i64>, page_size: Option<i64>) -> (i64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1).min(MAX_PAGE);
    let page_size = page_size
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page, page_size)
}

/// Trims a search term; blank terms count as absent.
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(sanitize_string)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_validator_rejects_empty_and_v1() {
        assert!(!is_valid_uuid(""));
        // version nibble is 1
        assert!(!is_valid_uuid("6fa459ea-ee8a-11ca-a4d1-0800200c9a66"));
        assert!(!is_valid_uuid("not-a-uuid"));
    }

    #[test]
    fn uuid_validator_accepts_v4_in_any_case() {
        let id = Uuid::new_v4().to_string();
        assert!(is_valid_uuid(&id));
        assert!(is_valid_uuid(&id.to_uppercase()));
        assert!(is_valid_uuid("550E8400-E29B-41D4-A716-446655440000"));
    }

    #[test]
    fn parse_uuid_reports_what_was_wrong() {
        let err = parse_uuid("nope", "user").unwrap_err();
        assert_eq!(err.to_string(), "Invalid user id format");

        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "user").unwrap(), id);
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("admin@example.com"));
        assert!(!is_valid_email("admin@example"));
        assert!(!is_valid_email("ad min@example.com"));
        assert!(!is_valid_email(""));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_email(&long));
    }

    #[test]
    fn url_validation_requires_http_scheme() {
        assert!(is_valid_url("https://example.com/download"));
        assert!(is_valid_url("http://localhost:8080"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("example.com"));
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("my-app"));
        assert!(is_valid_slug("app2"));
        assert!(!is_valid_slug("ab"));
        assert!(!is_valid_slug("My-App"));
        assert!(!is_valid_slug("my--app"));
        assert!(!is_valid_slug("-app"));
    }

    #[test]
    fn app_key_validation() {
        assert!(is_valid_app_key(&format!("ak_{}", "aB3".repeat(10) + "xy")));
        assert!(!is_valid_app_key("ak_short"));
        assert!(!is_valid_app_key(&format!("pk_{}", "a".repeat(32))));
    }

    #[test]
    fn sanitize_strips_brackets_and_caps_length() {
        assert_eq!(sanitize_string("  <b>hi</b>  "), "bhi/b");
        assert_eq!(sanitize_string(&"x".repeat(2000)).len(), 1000);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(clamp_pagination(None, None), (1, 10));
        assert_eq!(clamp_pagination(Some(0), Some(0)), (1, 10));
        assert_eq!(clamp_pagination(Some(-3), Some(500)), (1, 100));
        assert_eq!(clamp_pagination(Some(4), Some(25)), (4, 25));
    }

    #[test]
    fn huge_page_numbers_are_capped() {
        assert_eq!(clamp_pagination(Some(i64::MAX), Some(100)), (MAX_PAGE, 100));
        assert_eq!(clamp_pagination(Some(MAX_PAGE + 1), None), (MAX_PAGE, 10));
    }

    #[test]
    fn blank_search_is_absent() {
        assert_eq!(normalize_search(Some("   ")), None);
        assert_eq!(normalize_search(Some(" vip ")), Some("vip".into()));
        assert_eq!(normalize_search(None), None);
    }
}
