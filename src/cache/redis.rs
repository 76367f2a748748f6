use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use super::{CacheResult, CachedEntry, RedirectCache};
use crate::config::CacheConfig;
use crate::errors::{LinkHubError, Result};

/// 负缓存哨兵值，与正向条目共用一个 keyspace
const NOT_FOUND_SENTINEL: &str = "__nf__";

/// Redis 重定向缓存（多副本部署时共享）
///
/// 条目以 JSON 存储在 `{prefix}{code}` 下，负缓存写入哨兵值并用
/// 更短的 TTL。Redis 出错时降级为 Miss，由存储层兜底，绝不让
/// 缓存故障变成用户可见错误。
pub struct RedisRedirectCache {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    key_prefix: String,
    default_ttl: u64,
    negative_ttl: u64,
}

impl RedisRedirectCache {
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis.url.clone()).map_err(|e| {
            LinkHubError::database_config(format!("invalid Redis URL: {}", e))
        })?;

        let cache = Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            key_prefix: config.redis.key_prefix.clone(),
            default_ttl: config.default_ttl,
            negative_ttl: config.negative_ttl,
        };

        // 启动时做一次连通性检查，失败即报错而不是静默降级
        let mut conn = cache.get_connection().await.map_err(|e| {
            LinkHubError::database_connection(format!("Redis ping failed: {}", e))
        })?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| LinkHubError::database_connection(format!("Redis ping failed: {}", e)))?;

        debug!(
            "RedisRedirectCache connected: prefix='{}', ttl={}s, negative_ttl={}s",
            cache.key_prefix, cache.default_ttl, cache.negative_ttl
        );

        Ok(cache)
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> std::result::Result<MultiplexedConnection, redis::RedisError> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态重复建连
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    fn make_key(&self, code: &str) -> String {
        format!("{}{}", self.key_prefix, code)
    }
}

#[async_trait]
impl RedirectCache for RedisRedirectCache {
    async fn get(&self, code: &str) -> CacheResult {
        let redis_key = self.make_key(code);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                self.reset_connection().await;
                return CacheResult::Miss;
            }
        };

        let result: redis::RedisResult<Option<String>> = conn.get(&redis_key).await;

        match result {
            Ok(Some(data)) if data == NOT_FOUND_SENTINEL => {
                trace!("Negative cache hit for code: {}", code);
                CacheResult::NotFound
            }
            Ok(Some(data)) => match serde_json::from_str::<CachedEntry>(&data) {
                Ok(entry) => CacheResult::Found(entry),
                Err(e) => {
                    error!("Failed to deserialize cache entry for '{}': {}", code, e);
                    CacheResult::Miss
                }
            },
            Ok(None) => CacheResult::Miss,
            Err(e) => {
                error!("Redis GET failed for '{}': {}", code, e);
                self.reset_connection().await;
                CacheResult::Miss
            }
        }
    }

    async fn insert(&self, code: &str, entry: CachedEntry, ttl_secs: Option<u64>) {
        let redis_key = self.make_key(code);
        let ttl = ttl_secs.unwrap_or(self.default_ttl).max(1);

        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to serialize cache entry for '{}': {}", code, e);
                return;
            }
        };

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                self.reset_connection().await;
                return;
            }
        };

        if let Err(e) = conn
            .set_ex::<String, String, ()>(redis_key, serialized, ttl)
            .await
        {
            error!("Redis SETEX failed for '{}': {}", code, e);
            self.reset_connection().await;
        }
    }

    async fn mark_not_found(&self, code: &str) {
        let redis_key = self.make_key(code);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                self.reset_connection().await;
                return;
            }
        };

        if let Err(e) = conn
            .set_ex::<String, &str, ()>(redis_key, NOT_FOUND_SENTINEL, self.negative_ttl.max(1))
            .await
        {
            error!("Redis SETEX (negative) failed for '{}': {}", code, e);
            self.reset_connection().await;
        }
    }

    async fn invalidate(&self, code: &str) {
        let redis_key = self.make_key(code);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to get Redis connection: {}", e);
                self.reset_connection().await;
                return;
            }
        };

        match conn.del::<String, i32>(redis_key).await {
            Ok(deleted) => {
                trace!("Invalidated '{}' ({} keys removed)", code, deleted);
            }
            Err(e) => {
                error!("Redis DEL failed for '{}': {}", code, e);
                self.reset_connection().await;
            }
        }
    }

    async fn invalidate_all(&self) {
        // 共享实例上按前缀清空需要 SCAN，成本高且有误删风险；
        // 依赖 TTL 自然过期即可
        tracing::warn!("RedisRedirectCache does not implement invalidate_all; relying on TTL");
    }
}
