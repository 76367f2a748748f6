//! Write operations for SeaOrmStorage

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, SqlErr};
use tracing::info;

use super::converters::{model_to_shortlink, shortlink_to_active_model};
use super::{retry, SeaOrmStorage};
use crate::errors::{LinkHubError, Result};
use crate::storage::models::{LinkUpdate, ShortLink, User};

use migration::entities::{short_link, user};

impl SeaOrmStorage {
    /// 原子创建短链接
    ///
    /// 单条 INSERT，主键冲突由数据库保证：并发创建同一 code 时
    /// 恰好一个成功，其余得到 DuplicateCode。不做 upsert —— 短码
    /// 创建后不可变，覆盖写等于数据损坏。
    pub async fn create(&self, link: &ShortLink) -> Result<()> {
        let db = &self.db;
        let active_model = shortlink_to_active_model(link);

        let result = retry::with_retry(
            &format!("create({})", link.code),
            self.retry_config,
            || async {
                short_link::Entity::insert(active_model.clone())
                    .exec(db)
                    .await
            },
        )
        .await;

        match result {
            Ok(_) => {
                info!("Short link created: {} -> {}", link.code, link.target);
                Ok(())
            }
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    return Err(LinkHubError::duplicate_code(format!(
                        "short code '{}' already exists",
                        link.code
                    )));
                }
                Err(self.classify_db_error("create short link", e))
            }
        }
    }

    /// 部分更新（创建后唯一的常规变更路径）
    ///
    /// 返回更新后的完整记录，便于调用方回填缓存。
    pub async fn update(&self, code: &str, changes: &LinkUpdate) -> Result<ShortLink> {
        let db = &self.db;
        let code_owned = code.to_string();

        let existing = retry::with_retry(
            &format!("update.find({})", code),
            self.retry_config,
            || async { short_link::Entity::find_by_id(code_owned.clone()).one(db).await },
        )
        .await
        .map_err(|e| self.classify_db_error("lookup for update", e))?
        .ok_or_else(|| LinkHubError::not_found(format!("short link not found: {}", code)))?;

        let mut active: short_link::ActiveModel = existing.into();

        if let Some(ref target) = changes.target {
            active.target_url = Set(target.clone());
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(expires_at) = changes.expires_at {
            active.expires_at = Set(Some(expires_at));
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(db)
            .await
            .map_err(|e| self.classify_db_error("update short link", e))?;

        info!("Short link updated: {}", code);
        Ok(model_to_shortlink(updated))
    }

    /// 删除短链接
    pub async fn remove(&self, code: &str) -> Result<()> {
        let db = &self.db;
        let code_owned = code.to_string();

        let result = retry::with_retry(
            &format!("remove({})", code),
            self.retry_config,
            || async { short_link::Entity::delete_by_id(code_owned.clone()).exec(db).await },
        )
        .await
        .map_err(|e| self.classify_db_error("delete short link", e))?;

        if result.rows_affected == 0 {
            return Err(LinkHubError::not_found(format!(
                "short link not found: {}",
                code
            )));
        }

        info!("Short link deleted: {}", code);
        Ok(())
    }

    /// 创建账户；邮箱唯一键冲突映射为 DuplicateCode 之外的 Validation
    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let db = &self.db;
        let now = Utc::now();

        let active = user::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            created_at: Set(now),
            ..Default::default()
        };

        let result = retry::with_retry("create_user", self.retry_config, || async {
            active.clone().insert(db).await
        })
        .await;

        match result {
            Ok(model) => {
                info!("User registered: {}", model.email);
                Ok(User {
                    id: model.id,
                    email: model.email,
                    password_hash: model.password_hash,
                    created_at: model.created_at,
                })
            }
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    return Err(LinkHubError::validation(format!(
                        "email '{}' is already registered",
                        email
                    )));
                }
                Err(self.classify_db_error("create user", e))
            }
        }
    }
}
