use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use tracing::debug;

use super::{CacheResult, CachedEntry, RedirectCache};
use crate::config::CacheConfig;

/// 自定义过期策略：基于条目自身的 expires_at 截断 TTL
///
/// 插入时把计算好的 TTL 塞进 value 一起写入，Expiry 读取之。
struct EntryExpiry {
    default_ttl: Duration,
}

impl Expiry<String, (CachedEntry, Option<u64>)> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(CachedEntry, Option<u64>),
        _created_at: Instant,
    ) -> Option<Duration> {
        match value.1 {
            Some(ttl_secs) => Some(Duration::from_secs(ttl_secs.max(1))),
            None => match value.0.cache_ttl(self.default_ttl.as_secs()) {
                Some(ttl_secs) => Some(Duration::from_secs(ttl_secs.max(1))),
                // 已过期的条目给极短 TTL，立刻淘汰
                None => Some(Duration::from_secs(1)),
            },
        }
    }
}

/// 进程内重定向缓存
///
/// 正负两个 moka 实例：正向存 CachedEntry，负向只存 key 本身。
/// 容量上界 + TTL 淘汰，跨 key 无全局锁。
pub struct MokaRedirectCache {
    positive: Cache<String, (CachedEntry, Option<u64>)>,
    negative: Cache<String, ()>,
}

impl MokaRedirectCache {
    pub fn new(config: &CacheConfig) -> Self {
        let default_ttl = Duration::from_secs(config.default_ttl);

        let positive = Cache::builder()
            .max_capacity(config.memory.max_capacity)
            .expire_after(EntryExpiry { default_ttl })
            .build();

        // 负缓存容量给正向的 1/4，TTL 更短
        let negative = Cache::builder()
            .max_capacity((config.memory.max_capacity / 4).max(1024))
            .time_to_live(Duration::from_secs(config.negative_ttl))
            .build();

        debug!(
            "MokaRedirectCache initialized: capacity={}, ttl={}s, negative_ttl={}s",
            config.memory.max_capacity, config.default_ttl, config.negative_ttl
        );

        Self { positive, negative }
    }

    #[cfg(test)]
    pub async fn run_pending_tasks(&self) {
        self.positive.run_pending_tasks().await;
        self.negative.run_pending_tasks().await;
    }
}

#[async_trait]
impl RedirectCache for MokaRedirectCache {
    async fn get(&self, code: &str) -> CacheResult {
        if let Some((entry, _)) = self.positive.get(code).await {
            return CacheResult::Found(entry);
        }
        if self.negative.contains_key(code) {
            return CacheResult::NotFound;
        }
        CacheResult::Miss
    }

    async fn insert(&self, code: &str, entry: CachedEntry, ttl_secs: Option<u64>) {
        // 正向写入同时清掉负缓存，避免新建后仍被旧的 404 标记挡住
        self.negative.invalidate(code).await;
        self.positive.insert(code.to_string(), (entry, ttl_secs)).await;
    }

    async fn mark_not_found(&self, code: &str) {
        self.positive.invalidate(code).await;
        self.negative.insert(code.to_string(), ()).await;
    }

    async fn invalidate(&self, code: &str) {
        self.positive.invalidate(code).await;
        self.negative.invalidate(code).await;
    }

    async fn invalidate_all(&self) {
        self.positive.invalidate_all();
        self.negative.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use chrono::{Duration as ChronoDuration, Utc};

    fn test_cache() -> MokaRedirectCache {
        MokaRedirectCache::new(&CacheConfig::default())
    }

    fn live_entry() -> CachedEntry {
        CachedEntry {
            target: "https://example.com/a/b".to_string(),
            is_active: true,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_miss_then_found() {
        let cache = test_cache();
        assert!(matches!(cache.get("abcd123").await, CacheResult::Miss));

        cache.insert("abcd123", live_entry(), None).await;
        match cache.get("abcd123").await {
            CacheResult::Found(entry) => {
                assert_eq!(entry.target, "https://example.com/a/b");
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_negative_cache() {
        let cache = test_cache();

        cache.mark_not_found("missing1").await;
        assert!(matches!(cache.get("missing1").await, CacheResult::NotFound));

        // 其他 key 不受影响
        assert!(matches!(cache.get("missing2").await, CacheResult::Miss));
    }

    #[tokio::test]
    async fn test_insert_clears_negative_entry() {
        let cache = test_cache();

        cache.mark_not_found("newcode1").await;
        cache.insert("newcode1", live_entry(), None).await;

        assert!(matches!(cache.get("newcode1").await, CacheResult::Found(_)));
    }

    #[tokio::test]
    async fn test_invalidate_clears_both_sides() {
        let cache = test_cache();

        cache.insert("code1234", live_entry(), None).await;
        cache.invalidate("code1234").await;
        assert!(matches!(cache.get("code1234").await, CacheResult::Miss));

        cache.mark_not_found("code1234").await;
        cache.invalidate("code1234").await;
        assert!(matches!(cache.get("code1234").await, CacheResult::Miss));
    }

    #[tokio::test]
    async fn test_expired_entry_gets_short_ttl() {
        let cache = test_cache();

        let entry = CachedEntry {
            target: "https://example.com".to_string(),
            is_active: true,
            expires_at: Some(Utc::now() - ChronoDuration::hours(1)),
        };
        cache.insert("expired1", entry, None).await;

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        cache.run_pending_tasks().await;

        assert!(matches!(cache.get("expired1").await, CacheResult::Miss));
    }
}
