pub mod admin;
pub mod app_config;
pub mod app_version;
pub mod application;
pub mod audit_log;
pub mod dashboard;
pub mod membership;
pub mod membership_plan;
pub mod payment;
pub mod payment_config;
pub mod redemption_code;
pub mod user;

use serde::{Deserialize, Deserializer, Serialize};

use crate::validation::clamp_pagination;

/// One page of rows plus the exact number of rows matching the filters.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let (page, page_size) = clamp_pagination(page, page_size);
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn wrap<T>(self, data: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            data,
            total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates. Use with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        description: Option<Option<String>>,
    }

    #[test]
    fn nullable_separates_missing_from_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"description":"x"}"#).unwrap();

        assert_eq!(missing.description, None);
        assert_eq!(null.description, Some(None));
        assert_eq!(set.description, Some(Some("x".into())));
    }

    #[test]
    fn page_offsets() {
        let page = Page::new(Some(3), Some(20));
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);
        assert_eq!(Page::default(), Page { page: 1, page_size: 10 });
    }

    #[test]
    fn offset_of_the_largest_page_fits() {
        let page = Page::new(Some(i64::MAX), Some(100));
        assert_eq!(page.page, crate::validation::MAX_PAGE);
        assert_eq!(page.offset(), (crate::validation::MAX_PAGE - 1) * 100);
    }
}
