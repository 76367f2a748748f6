//! Analytics read queries over the raw click_events log
//!
//! 聚合器的数据访问层。时间分桶在 SQL 侧完成（按后端选择日期格式
//! 函数），referrer/UA 的分类不在这里做 —— 只按原始字符串分组取回
//! 计数，归类交给 `analytics::classify` 的纯函数在聚合时完成。

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ColumnTrait, DbBackend, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use super::{retry, SeaOrmStorage};
use crate::analytics::Granularity;
use crate::errors::Result;

use migration::entities::click_event;

/// 时间分桶行
#[derive(Debug, Clone, FromQueryResult)]
pub struct BucketRow {
    pub bucket: String,
    pub count: i64,
}

/// 按原始字符串分组的计数行（referrer / user_agent）
#[derive(Debug, Clone, FromQueryResult)]
pub struct KeyCountRow {
    pub value: Option<String>,
    pub count: i64,
}

/// 地理分组行
#[derive(Debug, Clone, FromQueryResult)]
pub struct GeoRow {
    pub country: Option<String>,
    pub city: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, FromQueryResult)]
struct RangeRow {
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
}

impl SeaOrmStorage {
    fn db_backend(&self) -> DbBackend {
        match self.backend_name.as_str() {
            "sqlite" => DbBackend::Sqlite,
            "mysql" => DbBackend::MySql,
            _ => DbBackend::Postgres,
        }
    }

    /// 按后端生成 clicked_at 的时间分桶表达式
    fn bucket_expr(&self, granularity: Granularity) -> SimpleExpr {
        let (sqlite_fmt, mysql_fmt, pg_fmt) = match granularity {
            Granularity::Hour => ("%Y-%m-%d %H:00", "%Y-%m-%d %H:00", "YYYY-MM-DD HH24:00"),
            Granularity::Day => ("%Y-%m-%d", "%Y-%m-%d", "YYYY-MM-DD"),
        };

        let raw = match self.db_backend() {
            DbBackend::Sqlite => format!("strftime('{}', clicked_at)", sqlite_fmt),
            DbBackend::MySql => format!("DATE_FORMAT(clicked_at, '{}')", mysql_fmt),
            _ => format!("TO_CHAR(clicked_at, '{}')", pg_fmt),
        };
        Expr::cust(raw).into()
    }

    /// 范围内总点击数
    pub async fn count_clicks(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64> {
        let db = &self.db;
        let code_owned = code.to_string();

        retry::with_retry("count_clicks", self.retry_config, || async {
            click_event::Entity::find()
                .filter(click_event::Column::ShortCode.eq(&code_owned))
                .filter(click_event::Column::ClickedAt.gte(from))
                .filter(click_event::Column::ClickedAt.lte(to))
                .count(db)
                .await
        })
        .await
        .map_err(|e| self.classify_db_error("count clicks", e))
    }

    /// 范围内首末点击时间
    pub async fn click_time_range(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let row = click_event::Entity::find()
            .select_only()
            .column_as(click_event::Column::ClickedAt.min(), "first")
            .column_as(click_event::Column::ClickedAt.max(), "last")
            .filter(click_event::Column::ShortCode.eq(code))
            .filter(click_event::Column::ClickedAt.gte(from))
            .filter(click_event::Column::ClickedAt.lte(to))
            .into_model::<RangeRow>()
            .one(&self.db)
            .await
            .map_err(|e| self.classify_db_error("click time range", e))?;

        match row {
            Some(r) => Ok((r.first, r.last)),
            None => Ok((None, None)),
        }
    }

    /// 时间序列分桶
    pub async fn clicks_timeseries(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<BucketRow>> {
        let bucket = self.bucket_expr(granularity);
        let bucket_alias: SimpleExpr = Expr::cust("bucket").into();

        click_event::Entity::find()
            .select_only()
            .column_as(bucket.clone(), "bucket")
            .column_as(click_event::Column::Id.count(), "count")
            .filter(click_event::Column::ShortCode.eq(code))
            .filter(click_event::Column::ClickedAt.gte(from))
            .filter(click_event::Column::ClickedAt.lte(to))
            .group_by(bucket)
            .order_by_asc(bucket_alias)
            .into_model::<BucketRow>()
            .all(&self.db)
            .await
            .map_err(|e| self.classify_db_error("timeseries query", e))
    }

    /// 按原始 referrer 字符串分组计数（NULL 即直接访问，一并返回）
    pub async fn referrer_rows(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<KeyCountRow>> {
        click_event::Entity::find()
            .select_only()
            .column_as(click_event::Column::Referrer, "value")
            .column_as(click_event::Column::Id.count(), "count")
            .filter(click_event::Column::ShortCode.eq(code))
            .filter(click_event::Column::ClickedAt.gte(from))
            .filter(click_event::Column::ClickedAt.lte(to))
            .group_by(click_event::Column::Referrer)
            .into_model::<KeyCountRow>()
            .all(&self.db)
            .await
            .map_err(|e| self.classify_db_error("referrer query", e))
    }

    /// 按原始 user_agent 字符串分组计数
    pub async fn user_agent_rows(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<KeyCountRow>> {
        click_event::Entity::find()
            .select_only()
            .column_as(click_event::Column::UserAgent, "value")
            .column_as(click_event::Column::Id.count(), "count")
            .filter(click_event::Column::ShortCode.eq(code))
            .filter(click_event::Column::ClickedAt.gte(from))
            .filter(click_event::Column::ClickedAt.lte(to))
            .group_by(click_event::Column::UserAgent)
            .into_model::<KeyCountRow>()
            .all(&self.db)
            .await
            .map_err(|e| self.classify_db_error("user agent query", e))
    }

    /// 按 country/city 分组计数
    pub async fn geo_rows(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<GeoRow>> {
        click_event::Entity::find()
            .select_only()
            .column(click_event::Column::Country)
            .column(click_event::Column::City)
            .column_as(click_event::Column::Id.count(), "count")
            .filter(click_event::Column::ShortCode.eq(code))
            .filter(click_event::Column::ClickedAt.gte(from))
            .filter(click_event::Column::ClickedAt.lte(to))
            .group_by(click_event::Column::Country)
            .group_by(click_event::Column::City)
            .into_model::<GeoRow>()
            .all(&self.db)
            .await
            .map_err(|e| self.classify_db_error("geo query", e))
    }

    /// 全局最新事件时间（lag 水位计算用）
    pub async fn latest_event_at(&self) -> Result<Option<DateTime<Utc>>> {
        let row = click_event::Entity::find()
            .select_only()
            .column_as(click_event::Column::ClickedAt.min(), "first")
            .column_as(click_event::Column::ClickedAt.max(), "last")
            .into_model::<RangeRow>()
            .one(&self.db)
            .await
            .map_err(|e| self.classify_db_error("latest event query", e))?;

        Ok(row.and_then(|r| r.last))
    }
}
