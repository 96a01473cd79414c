//! Resolved-asset cache using moka
//!
//! Remembers how a request was satisfied so an identical request (same
//! locator, same transform parameters) skips both fetch and transform.
//! Only successful resolutions are stored; fallbacks never are.

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use vmp_core::{AssetRequest, Dimensions};

/// Cache key: source locator plus everything that shapes the output
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    locator: String,
    target: Option<Dimensions>,
    quality: Option<u8>,
}

impl CacheKey {
    /// Key for a request; the quality is the one actually applied
    #[must_use]
    pub fn for_request(request: &AssetRequest, default_quality: u8) -> Self {
        let quality = request
            .wants_transform()
            .then(|| request.quality_hint.unwrap_or(default_quality));
        Self {
            locator: request.source_locator.clone(),
            target: request.target_dimensions,
            quality,
        }
    }
}

/// How a request was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The source locator itself
    Source,
    /// Transformed bytes, re-surfaced as a fresh blob on every hit
    Transformed(Arc<[u8]>),
}

/// Size-bounded cache of resolved assets, evicting least recently used first
#[derive(Debug, Clone)]
pub struct AssetCache {
    inner: Cache<CacheKey, Resolved>,
}

impl AssetCache {
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    #[inline]
    pub async fn get(&self, key: &CacheKey) -> Option<Resolved> {
        self.inner.get(key).await
    }

    #[inline]
    pub async fn insert(&self, key: CacheKey, resolved: Resolved) {
        self.inner.insert(key, resolved).await;
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Entry count as of the last housekeeping pass
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Apply pending inserts and evictions so `entry_count` is exact
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_quality_without_transform() {
        let plain = AssetRequest::new("a.jpg");
        let key = CacheKey::for_request(&plain, 82);
        assert_eq!(key.quality, None);

        let sized = AssetRequest::new("a.jpg").with_target_dimensions(100, 100);
        assert_eq!(CacheKey::for_request(&sized, 82).quality, Some(82));
    }

    #[test]
    fn transform_parameters_distinguish_keys() {
        let small = CacheKey::for_request(&AssetRequest::new("a.jpg").with_target_dimensions(100, 100), 82);
        let large = CacheKey::for_request(&AssetRequest::new("a.jpg").with_target_dimensions(800, 600), 82);
        let plain = CacheKey::for_request(&AssetRequest::new("a.jpg"), 82);
        assert_ne!(small, large);
        assert_ne!(small, plain);
    }

    #[tokio::test]
    async fn insert_then_get() {
        let cache = AssetCache::new(8);
        let key = CacheKey::for_request(&AssetRequest::new("a.jpg"), 82);
        assert!(cache.get(&key).await.is_none());

        cache.insert(key.clone(), Resolved::Source).await;
        assert_eq!(cache.get(&key).await, Some(Resolved::Source));

        cache.invalidate_all();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn full_cache_evicts_least_recently_used() {
        let cache = AssetCache::new(2);
        let key = |name: &str| CacheKey::for_request(&AssetRequest::new(name), 82);

        cache.insert(key("a.jpg"), Resolved::Source).await;
        cache.insert(key("b.jpg"), Resolved::Source).await;
        cache.run_pending_tasks().await;
        assert!(cache.get(&key("a.jpg")).await.is_some());
        cache.run_pending_tasks().await;

        cache.insert(key("c.jpg"), Resolved::Source).await;
        cache.run_pending_tasks().await;

        assert_eq!(cache.entry_count(), 2);
        assert!(cache.get(&key("a.jpg")).await.is_some());
        assert!(cache.get(&key("b.jpg")).await.is_none());
        assert!(cache.get(&key("c.jpg")).await.is_some());
    }
}
