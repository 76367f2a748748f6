//! 重定向缓存
//!
//! 热路径读缓存，挡在 URL Store 前面。两个可选后端：
//! - memory: 进程内 moka，默认
//! - redis: 跨实例共享，适合多副本部署
//!
//! 正向条目带 TTL（分钟量级），负缓存 TTL 更短，用于钝化不存在
//! 短码的重复扫描。停用/删除/更新会显式 invalidate，失效窗口取
//! TTL 与主动失效信号中的较小者。

mod memory;
mod redis;

pub use memory::MokaRedirectCache;
pub use redis::RedisRedirectCache;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::errors::{LinkHubError, Result};

/// 缓存条目：回答一次重定向所需的最小字段集
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub target: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedEntry {
    /// 链接当前是否可重定向
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }

    /// 计算条目的缓存 TTL（秒）
    ///
    /// 上限为 default_ttl，但不会越过 expires_at；已过期返回 None。
    pub fn cache_ttl(&self, default_ttl: u64) -> Option<u64> {
        match self.expires_at {
            None => Some(default_ttl),
            Some(expires_at) => {
                let remaining = (expires_at - Utc::now()).num_seconds();
                if remaining <= 0 {
                    None
                } else {
                    Some((remaining as u64).min(default_ttl))
                }
            }
        }
    }
}

/// 缓存查询结果
#[derive(Debug, Clone)]
pub enum CacheResult {
    /// 命中正向条目
    Found(CachedEntry),
    /// 命中负缓存：确定不存在，无需回源
    NotFound,
    /// 未命中：需要查询存储层
    Miss,
}

#[async_trait]
pub trait RedirectCache: Send + Sync {
    async fn get(&self, code: &str) -> CacheResult;

    /// 写入正向条目；ttl 为 None 时使用后端默认 TTL
    async fn insert(&self, code: &str, entry: CachedEntry, ttl_secs: Option<u64>);

    /// 写入负缓存条目（确认不存在的 code）
    async fn mark_not_found(&self, code: &str);

    /// 显式失效（更新/停用/删除时调用），同时清掉正负两侧
    async fn invalidate(&self, code: &str);

    async fn invalidate_all(&self);
}

/// 根据配置创建缓存后端
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<dyn RedirectCache>> {
    match config.cache_type.as_str() {
        "memory" => Ok(Arc::new(MokaRedirectCache::new(config))),
        "redis" => {
            let cache = RedisRedirectCache::connect(config).await?;
            Ok(Arc::new(cache))
        }
        other => Err(LinkHubError::validation(format!(
            "unknown cache backend '{}': expected 'memory' or 'redis'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(is_active: bool, expires_at: Option<DateTime<Utc>>) -> CachedEntry {
        CachedEntry {
            target: "https://example.com".to_string(),
            is_active,
            expires_at,
        }
    }

    #[test]
    fn test_is_live() {
        let now = Utc::now();
        assert!(entry(true, None).is_live(now));
        assert!(entry(true, Some(now + Duration::hours(1))).is_live(now));
        assert!(!entry(true, Some(now - Duration::seconds(1))).is_live(now));
        assert!(!entry(false, None).is_live(now));
        assert!(!entry(false, Some(now + Duration::hours(1))).is_live(now));
    }

    #[test]
    fn test_cache_ttl_capped_by_expiry() {
        assert_eq!(entry(true, None).cache_ttl(300), Some(300));

        let soon = Utc::now() + Duration::seconds(30);
        let ttl = entry(true, Some(soon)).cache_ttl(300).unwrap();
        assert!(ttl <= 30);

        let past = Utc::now() - Duration::seconds(30);
        assert_eq!(entry(true, Some(past)).cache_ttl(300), None);
    }
}
