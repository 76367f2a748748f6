pub mod aggregator;
pub mod classify;
pub mod pipeline;
mod sink;

pub use aggregator::{Aggregator, LagInfo};
pub use pipeline::{ClickPipeline, PipelineSnapshot};
pub use sink::ClickSink;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 重定向时同步捕获的点击事件（廉价、纯内存）
///
/// 原始字符串原样带走，解析和富化全部发生在管线消费端：
/// ip_address 只用于推导地理字段，不落盘。
#[derive(Debug, Clone)]
pub struct ClickEvent {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClickEvent {
    pub fn new(code: String) -> Self {
        Self {
            code,
            timestamp: Utc::now(),
            referrer: None,
            user_agent: None,
            ip_address: None,
        }
    }
}

/// 时间序列粒度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    #[default]
    Day,
}

impl Granularity {
    pub fn parse(s: &str) -> Self {
        match s {
            "hour" => Granularity::Hour,
            _ => Granularity::Day,
        }
    }
}

// ============ 聚合输出类型 ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub code: String,
    pub total_clicks: u64,
    pub first_click: Option<DateTime<Utc>>,
    pub last_click: Option<DateTime<Utc>>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeseriesPoint {
    pub bucket: String,
    pub clicks: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferrerStat {
    pub referrer: String,
    pub clicks: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStat {
    pub name: String,
    pub clicks: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    pub device_types: Vec<CategoryStat>,
    pub browsers: Vec<CategoryStat>,
    pub operating_systems: Vec<CategoryStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryStat {
    pub country: String,
    pub clicks: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CityStat {
    pub country: String,
    pub city: String,
    pub clicks: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeoStats {
    pub countries: Vec<CountryStat>,
    pub cities: Vec<CityStat>,
}

/// 展示用百分比：四舍五入到两位小数，内部计数保持精确
pub(crate) fn display_percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10000.0).round() / 100.0
}
