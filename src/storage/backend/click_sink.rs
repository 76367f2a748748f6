//! ClickSink implementation for SeaOrmStorage
//!
//! # Security Note
//!
//! Counter flushes build a CASE WHEN statement; all `short_code` values are
//! validated via `utils::is_valid_short_code()` as defense-in-depth before
//! they reach SQL, in addition to parameter binding.

use async_trait::async_trait;
use sea_orm::sea_query::{CaseStatement, Expr, Query};
use sea_orm::{ConnectionTrait, EntityTrait};
use tracing::debug;

use super::converters::event_to_active_model;
use super::{retry, SeaOrmStorage};
use crate::analytics::ClickSink;
use crate::storage::models::StoredClickEvent;
use crate::utils::is_valid_short_code;

use migration::entities::{click_event, short_link};

#[async_trait]
impl ClickSink for SeaOrmStorage {
    /// 批量累加 click_count
    ///
    /// 单条 UPDATE + CASE WHEN，避免对热门 code 做整行读改写。
    async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        for (code, _) in &updates {
            if !is_valid_short_code(code) {
                return Err(anyhow::anyhow!(
                    "invalid short_code format detected: '{}' - refusing to execute SQL",
                    code
                ));
            }
        }

        let total_count = updates.len();

        // CASE WHEN 表达式（跨 SQLite/MySQL/Postgres 兼容）
        let mut case_stmt = CaseStatement::new();
        let mut codes: Vec<String> = Vec::with_capacity(total_count);

        for (code, count) in &updates {
            case_stmt = case_stmt.case(
                Expr::col(short_link::Column::ShortCode).eq(code.as_str()),
                Expr::col(short_link::Column::ClickCount).add(*count as i64),
            );
            codes.push(code.clone());
        }
        // 不匹配的保持原值
        case_stmt = case_stmt.finally(Expr::col(short_link::Column::ClickCount));

        let stmt = Query::update()
            .table(short_link::Entity)
            .value(short_link::Column::ClickCount, case_stmt)
            .and_where(Expr::col(short_link::Column::ShortCode).is_in(codes))
            .to_owned();

        let db = &self.db;
        let backend = db.get_database_backend();
        retry::with_retry("flush_clicks", self.retry_config, || async {
            db.execute(backend.build(&stmt)).await
        })
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to batch update click counts (still failing after retries): {}",
                e
            )
        })?;

        debug!(
            "Click counts flushed to {} database ({} codes)",
            self.backend_name.to_uppercase(),
            total_count
        );

        Ok(())
    }

    /// 批量插入原始点击事件
    async fn insert_events(&self, events: Vec<StoredClickEvent>) -> anyhow::Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let total_count = events.len();
        let models: Vec<click_event::ActiveModel> =
            events.iter().map(event_to_active_model).collect();

        let db = &self.db;
        retry::with_retry("insert_events", self.retry_config, || async {
            click_event::Entity::insert_many(models.clone()).exec(db).await
        })
        .await
        .map_err(|e| anyhow::anyhow!("failed to batch insert click events: {}", e))?;

        debug!(
            "Click events written to {} database ({} records)",
            self.backend_name.to_uppercase(),
            total_count
        );

        Ok(())
    }
}
