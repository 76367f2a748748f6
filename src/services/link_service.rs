//! 短链接管理服务
//!
//! 创建/查询/更新/删除的业务逻辑层。写路径维护缓存一致性：
//! 创建时 write-through，更新/删除/停用时显式 invalidate，
//! 把失效窗口压到 TTL 与主动失效信号的较小者。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::cache::RedirectCache;
use crate::errors::{LinkHubError, Result};
use crate::keygen;
use crate::storage::models::{LinkUpdate, ShortLink};
use crate::storage::SeaOrmStorage;
use crate::utils::validate_target_url;

/// 创建请求
#[derive(Debug, Clone)]
pub struct CreateLinkRequest {
    pub long_url: String,
    pub custom_alias: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct LinkService {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn RedirectCache>,
    cache_ttl: u64,
}

impl LinkService {
    pub fn new(storage: Arc<SeaOrmStorage>, cache: Arc<dyn RedirectCache>, cache_ttl: u64) -> Self {
        Self {
            storage,
            cache,
            cache_ttl,
        }
    }

    /// 创建短链接
    ///
    /// 自定义别名：格式校验后单次尝试，冲突对调用方终态（换别名重试）。
    /// 随机码：碰撞时换码重试，上限耗尽上浮 GenerationExhausted
    /// （64^7 键空间下实际不可达，但处理而非假设）。
    pub async fn create(&self, owner_id: i64, request: CreateLinkRequest) -> Result<ShortLink> {
        validate_target_url(&request.long_url)?;

        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(LinkHubError::validation(
                    "expiry date must be in the future",
                ));
            }
        }

        let link = match &request.custom_alias {
            Some(alias) if !alias.trim().is_empty() => {
                let code = keygen::validate_custom(alias)?;
                let link = Self::build_link(code, owner_id, &request, true);
                self.storage.create(&link).await?;
                link
            }
            _ => self.create_with_random_code(owner_id, &request).await?,
        };

        // write-through：新建即可被重定向命中
        let entry = link.to_cache_entry();
        let ttl = entry.cache_ttl(self.cache_ttl);
        self.cache.insert(&link.code, entry, ttl).await;

        info!(
            "URL created: code={}, owner={}, custom_alias={}",
            link.code, owner_id, link.is_custom_alias
        );
        Ok(link)
    }

    async fn create_with_random_code(
        &self,
        owner_id: i64,
        request: &CreateLinkRequest,
    ) -> Result<ShortLink> {
        for attempt in 1..=keygen::MAX_GENERATE_ATTEMPTS {
            let code = keygen::generate();
            let link = Self::build_link(code, owner_id, request, false);

            match self.storage.create(&link).await {
                Ok(()) => return Ok(link),
                Err(LinkHubError::DuplicateCode(_)) => {
                    info!(
                        "Random code collision on attempt {}/{}, retrying with a fresh draw",
                        attempt,
                        keygen::MAX_GENERATE_ATTEMPTS
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        error!(
            "Code generation exhausted after {} attempts - keyspace saturation or storage anomaly",
            keygen::MAX_GENERATE_ATTEMPTS
        );
        Err(LinkHubError::generation_exhausted(format!(
            "failed to allocate a unique code after {} attempts",
            keygen::MAX_GENERATE_ATTEMPTS
        )))
    }

    fn build_link(
        code: String,
        owner_id: i64,
        request: &CreateLinkRequest,
        is_custom_alias: bool,
    ) -> ShortLink {
        let now = Utc::now();
        ShortLink {
            code,
            target: request.long_url.trim().to_string(),
            owner_id,
            is_custom_alias,
            is_active: true,
            expires_at: request.expires_at,
            created_at: now,
            updated_at: now,
            click_count: 0,
        }
    }

    /// 查询单条（带所有权校验；他人链接渲染为 404，不泄露存在性）
    pub async fn get_owned(&self, owner_id: i64, code: &str) -> Result<ShortLink> {
        let link = self
            .storage
            .get(code)
            .await?
            .ok_or_else(|| LinkHubError::not_found(format!("short link not found: {}", code)))?;

        if link.owner_id != owner_id {
            return Err(LinkHubError::not_found(format!(
                "short link not found: {}",
                code
            )));
        }

        Ok(link)
    }

    /// owner 分页列表，created_at 倒序
    pub async fn list(
        &self,
        owner_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<ShortLink>, u64)> {
        self.storage.list_by_owner(owner_id, page, page_size).await
    }

    /// 部分更新（创建后唯一的常规变更路径）
    pub async fn update(&self, owner_id: i64, code: &str, changes: LinkUpdate) -> Result<ShortLink> {
        if changes.is_empty() {
            return Err(LinkHubError::validation("no fields to update"));
        }

        if let Some(ref target) = changes.target {
            validate_target_url(target)?;
        }
        if let Some(expires_at) = changes.expires_at {
            if expires_at <= Utc::now() {
                return Err(LinkHubError::validation(
                    "expiry date must be in the future",
                ));
            }
        }

        // 所有权校验优先于一切变更
        self.get_owned(owner_id, code).await?;

        let updated = self.storage.update(code, &changes).await?;

        // 先失效；仍可重定向的再回填新值，停用的留给负缓存
        self.cache.invalidate(code).await;
        if updated.is_live(Utc::now()) {
            let entry = updated.to_cache_entry();
            let ttl = entry.cache_ttl(self.cache_ttl);
            self.cache.insert(code, entry, ttl).await;
        }

        info!("URL updated: code={}, owner={}", code, owner_id);
        Ok(updated)
    }

    /// 删除（硬删除 + 主动缓存失效）
    pub async fn delete(&self, owner_id: i64, code: &str) -> Result<()> {
        self.get_owned(owner_id, code).await?;

        self.storage.remove(code).await?;
        self.cache.invalidate(code).await;

        info!("URL deleted: code={}, owner={}", code, owner_id);
        Ok(())
    }
}
