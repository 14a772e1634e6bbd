//! Read-through cache for list, detail and stats queries.
//!
//! Keys are `"{entity}:{operation}:{params}"`. Mutations drop every key of the
//! entity they touched, so a read after a write always goes to the database.
//! Each entity also has a generation counter bumped on invalidation; a load
//! that overlapped an invalidation is returned but never cached.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::error::AppError;

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

pub struct QueryCache {
    entries: DashMap<String, Entry>,
    generations: DashMap<String, u64>,
    ttl: Duration,
    max_entries: usize,
}

impl QueryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn key(entity: &str, operation: &str, params: &impl Serialize) -> String {
        let params = serde_json::to_string(params).unwrap_or_default();
        format!("{entity}:{operation}:{params}")
    }

    pub fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.get_at(key, Instant::now())
    }

    fn get_at<T: Clone + 'static>(&self, key: &str, now: Instant) -> Option<T> {
        let entry = self.entries.get(key)?;
        if now.duration_since(entry.stored_at) >= self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: String, value: T) {
        if !self.enabled() {
            return;
        }
        if self.entries.len() >= self.max_entries {
            self.evict(Instant::now());
        }
        self.entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                stored_at: Instant::now(),
            },
        );
    }

    fn evict(&self, now: Instant) {
        self.entries
            .retain(|_, e| now.duration_since(e.stored_at) < self.ttl);
        if self.entries.len() >= self.max_entries {
            tracing::debug!(entries = self.entries.len(), "query cache full, clearing");
            self.entries.clear();
        }
    }

    /// Returns the cached value for `key`, or runs `load` and caches its
    /// result. Errors are never cached.
    pub async fn get_or_load<T, F, Fut>(&self, key: String, load: F) -> Result<T, AppError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(hit) = self.get::<T>(&key) {
            return Ok(hit);
        }
        let entity = entity_of(&key).to_string();
        let started = self.generation(&entity);
        let value = load().await?;
        if self.generation(&entity) != started {
            return Ok(value);
        }
        self.insert(key.clone(), value.clone());
        // invalidate bumps before it drops keys, so a bump seen here may have
        // missed the entry just inserted
        if self.generation(&entity) != started {
            self.entries.remove(&key);
        }
        Ok(value)
    }

    fn generation(&self, entity: &str) -> u64 {
        self.generations.get(entity).map(|g| *g).unwrap_or(0)
    }

    pub fn invalidate(&self, entity: &str) {
        *self.generations.entry(entity.to_string()).or_insert(0) += 1;
        let prefix = format!("{entity}:");
        self.entries.retain(|k, _| !k.starts_with(&prefix));
    }
}

fn entity_of(key: &str) -> &str {
    key.split_once(':').map_or(key, |(entity, _)| entity)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Serialize)]
    struct Filters {
        status: Option<&'static str>,
    }

    #[test]
    fn keys_include_entity_operation_and_params() {
        let key = QueryCache::key("redemption_codes", "list", &Filters { status: Some("active") });
        assert_eq!(key, r#"redemption_codes:list:{"status":"active"}"#);
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = QueryCache::new(Duration::from_secs(60), 16);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v: i64 = cache
                .get_or_load("users:list:{}".into(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60), 16);
        let first: Result<i64, _> = cache
            .get_or_load("users:get:1".into(), || async {
                Err(AppError::NotFound("User not found".into()))
            })
            .await;
        assert!(first.is_err());
        assert_eq!(cache.entries.len(), 0);
    }

    #[tokio::test]
    async fn load_overlapping_an_invalidation_is_not_cached() {
        let cache = QueryCache::new(Duration::from_secs(60), 16);
        let key = QueryCache::key("redemption_codes", "stats", &());

        let v: i64 = cache
            .get_or_load(key.clone(), || async {
                cache.invalidate("redemption_codes");
                Ok(1)
            })
            .await
            .unwrap();

        assert_eq!(v, 1);
        assert_eq!(cache.get::<i64>(&key), None);

        let fresh: i64 = cache
            .get_or_load(key.clone(), || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(fresh, 2);
        assert_eq!(cache.get::<i64>(&key), Some(2));
    }

    #[tokio::test]
    async fn invalidating_another_entity_does_not_block_caching() {
        let cache = QueryCache::new(Duration::from_secs(60), 16);
        let _: i64 = cache
            .get_or_load("users:list:{}".into(), || async {
                cache.invalidate("applications");
                Ok(3)
            })
            .await
            .unwrap();
        assert_eq!(cache.get::<i64>("users:list:{}"), Some(3));
    }

    #[test]
    fn invalidate_drops_only_the_entity_prefix() {
        let cache = QueryCache::new(Duration::from_secs(60), 16);
        cache.insert("redemption_codes:list:{}".into(), 1_i64);
        cache.insert("redemption_codes:stats:null".into(), 2_i64);
        cache.insert("redemption_codes_archive:list:{}".into(), 3_i64);
        cache.insert("applications:list:{}".into(), 4_i64);

        cache.invalidate("redemption_codes");

        assert_eq!(cache.get::<i64>("redemption_codes:list:{}"), None);
        assert_eq!(cache.get::<i64>("redemption_codes:stats:null"), None);
        assert_eq!(cache.get::<i64>("redemption_codes_archive:list:{}"), Some(3));
        assert_eq!(cache.get::<i64>("applications:list:{}"), Some(4));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = QueryCache::new(Duration::from_secs(30), 16);
        cache.insert("plans:list:{}".into(), 5_i64);

        let later = Instant::now() + Duration::from_secs(31);
        assert_eq!(cache.get_at::<i64>("plans:list:{}", later), None);
        assert_eq!(cache.entries.len(), 0);
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = QueryCache::new(Duration::ZERO, 16);
        cache.insert("plans:list:{}".into(), 5_i64);
        assert_eq!(cache.entries.len(), 0);
    }

    #[test]
    fn full_cache_is_cleared_before_insert() {
        let cache = QueryCache::new(Duration::from_secs(60), 2);
        cache.insert("a:x:1".into(), 1_i64);
        cache.insert("a:x:2".into(), 2_i64);
        cache.insert("a:x:3".into(), 3_i64);
        assert_eq!(cache.entries.len(), 1);
        assert_eq!(cache.get::<i64>("a:x:3"), Some(3));
    }

    #[test]
    fn wrong_type_is_a_miss() {
        let cache = QueryCache::new(Duration::from_secs(60), 4);
        cache.insert("a:x:1".into(), 1_i64);
        assert_eq!(cache.get::<String>("a:x:1"), None);
    }
}
