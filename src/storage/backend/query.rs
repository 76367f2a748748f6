//! Read-only storage operations

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use super::{retry, SeaOrmStorage};
use crate::errors::Result;
use crate::storage::models::{ShortLink, User};

use migration::entities::{short_link, user};

use super::converters::model_to_shortlink;

impl SeaOrmStorage {
    /// 按短码查询
    ///
    /// `Ok(None)` 表示确认不存在；基础设施故障返回 `Err(TransientStore)`，
    /// 调用方不得把后者当成 NotFound 处理。
    pub async fn get(&self, code: &str) -> Result<Option<ShortLink>> {
        let db = &self.db;
        let code_owned = code.to_string();

        let result = retry::with_retry(&format!("get({})", code), self.retry_config, || async {
            short_link::Entity::find_by_id(code_owned.clone()).one(db).await
        })
        .await
        .map_err(|e| self.classify_db_error("lookup short link", e))?;

        Ok(result.map(model_to_shortlink))
    }

    /// 按 owner 分页列出链接，created_at 倒序，页码从 1 开始
    ///
    /// 返回 (本页数据, 总条数)。
    pub async fn list_by_owner(
        &self,
        owner_id: i64,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<ShortLink>, u64)> {
        let db = &self.db;
        let page_size = page_size.clamp(1, 200);
        let page_offset = page.saturating_sub(1);

        let paginator = short_link::Entity::find()
            .filter(short_link::Column::OwnerId.eq(owner_id))
            .order_by_desc(short_link::Column::CreatedAt)
            .paginate(db, page_size);

        let total = retry::with_retry("list_by_owner(count)", self.retry_config, || async {
            short_link::Entity::find()
                .filter(short_link::Column::OwnerId.eq(owner_id))
                .count(db)
                .await
        })
        .await
        .map_err(|e| self.classify_db_error("count owner links", e))?;

        let models = retry::with_retry("list_by_owner(data)", self.retry_config, || async {
            paginator.fetch_page(page_offset).await
        })
        .await
        .map_err(|e| self.classify_db_error("list owner links", e))?;

        let links = models.into_iter().map(model_to_shortlink).collect();
        Ok((links, total))
    }

    /// 按邮箱查找账户
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let db = &self.db;
        let email_owned = email.to_string();

        let result = retry::with_retry("find_user_by_email", self.retry_config, || async {
            user::Entity::find()
                .filter(user::Column::Email.eq(&email_owned))
                .one(db)
                .await
        })
        .await
        .map_err(|e| self.classify_db_error("lookup user", e))?;

        Ok(result.map(|m| User {
            id: m.id,
            email: m.email,
            password_hash: m.password_hash,
            created_at: m.created_at,
        }))
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let db = &self.db;

        let result = retry::with_retry("get_user", self.retry_config, || async {
            user::Entity::find_by_id(id).one(db).await
        })
        .await
        .map_err(|e| self.classify_db_error("lookup user", e))?;

        Ok(result.map(|m| User {
            id: m.id,
            email: m.email,
            password_hash: m.password_hash,
            created_at: m.created_at,
        }))
    }
}
