//! 重定向解析器
//!
//! 最热的路径。每次解析相互独立，不持任何跨请求锁；对缓存与存储
//! 的访问都是线程安全客户端上的单次操作。
//!
//! 错误语义是这里的关键约束：存储层的瞬态故障（TransientStore）
//! 必须原样上浮为 5xx —— 假的 404 对调用方与数据丢失无法区分，
//! 瞬态错误则会引导合理的重试。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use crate::analytics::{ClickEvent, ClickPipeline};
use crate::cache::{CacheResult, RedirectCache};
use crate::errors::{LinkHubError, Result};
use crate::storage::SeaOrmStorage;

/// 重定向请求上下文：同步阶段只携带原始字符串
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

pub struct RedirectResolver {
    cache: Arc<dyn RedirectCache>,
    storage: Arc<SeaOrmStorage>,
    pipeline: ClickPipeline,
    cache_ttl: u64,
}

impl RedirectResolver {
    pub fn new(
        cache: Arc<dyn RedirectCache>,
        storage: Arc<SeaOrmStorage>,
        pipeline: ClickPipeline,
        cache_ttl: u64,
    ) -> Self {
        Self {
            cache,
            storage,
            pipeline,
            cache_ttl,
        }
    }

    /// 解析短码到目标 URL
    ///
    /// 成功路径入队点击事件（fire-and-forget，有界队列，绝不阻塞）。
    /// NotFound / Inactive 对 HTTP 层渲染为同一个 404。
    pub async fn resolve(&self, code: &str, ctx: ClickContext) -> Result<String> {
        let now = Utc::now();

        match self.cache.get(code).await {
            CacheResult::Found(entry) => {
                if !entry.is_live(now) {
                    // 停用/过期条目：转入负缓存，避免反复走到这里
                    debug!("Cached entry no longer live: {}", code);
                    self.cache.mark_not_found(code).await;
                    return Err(LinkHubError::inactive(format!(
                        "link inactive or expired: {}",
                        code
                    )));
                }
                self.record_click(code, ctx);
                Ok(entry.target)
            }
            CacheResult::NotFound => {
                trace!("Negative cache hit: {}", code);
                Err(LinkHubError::not_found(format!(
                    "short link not found: {}",
                    code
                )))
            }
            CacheResult::Miss => {
                // 回源。`?` 让 TransientStore 原样上浮：
                // "无法确认" 绝不能折叠成 "确认不存在"
                match self.storage.get(code).await? {
                    Some(link) => {
                        if !link.is_live(now) {
                            debug!("Stored link not live: {}", code);
                            self.cache.mark_not_found(code).await;
                            return Err(LinkHubError::inactive(format!(
                                "link inactive or expired: {}",
                                code
                            )));
                        }

                        // cache-aside 回填，TTL 不越过剩余有效期
                        let entry = link.to_cache_entry();
                        let ttl = entry.cache_ttl(self.cache_ttl);
                        self.cache.insert(code, entry, ttl).await;

                        self.record_click(code, ctx);
                        Ok(link.target)
                    }
                    None => {
                        // 确认不存在：负缓存钝化重复扫描
                        debug!("Short link not found in storage: {}", code);
                        self.cache.mark_not_found(code).await;
                        Err(LinkHubError::not_found(format!(
                            "short link not found: {}",
                            code
                        )))
                    }
                }
            }
        }
    }

    /// 点击事件入队 + 计数递增请求（均为异步批处理，不做任何 I/O）
    fn record_click(&self, code: &str, ctx: ClickContext) {
        let mut event = ClickEvent::new(code.to_string());
        event.referrer = ctx.referrer;
        event.user_agent = ctx.user_agent;
        event.ip_address = ctx.ip_address;

        // 返回值有意忽略：背压丢弃只是内部计数，不是错误
        self.pipeline.enqueue(event);
    }

    /// 管线计数快照（健康检查用）
    pub fn pipeline_snapshot(&self) -> crate::analytics::PipelineSnapshot {
        self.pipeline.snapshot()
    }
}
