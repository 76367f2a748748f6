//! 分析聚合器
//!
//! 从 click_events 原始日志重算 summary / timeseries / referrer /
//! device / geo 统计。所有输出都是可重算的派生数据：同一事件集
//! 上重复执行得到完全一致的结果（幂等）。
//!
//! referrer 归桶与 UA 解析在这里进行（而不是捕获时），改分类逻辑
//! 不需要回填。后台任务周期性记录成功运行水位，对外暴露 lag 指标。

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use super::classify::{classify_referrer, classify_user_agent};
use super::{
    display_percentage, AnalyticsSummary, CategoryStat, CityStat, CountryStat, DeviceStats,
    GeoStats, Granularity, ReferrerStat, TimeseriesPoint,
};
use crate::config::AggregatorConfig;
use crate::errors::Result;
use crate::storage::SeaOrmStorage;

/// lag 指标：消费方据此提示"数据可能滞后"
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LagInfo {
    /// 距上次成功聚合运行的秒数
    pub lag_seconds: i64,
    /// lag 超过配置阈值
    pub delayed: bool,
    pub message: String,
}

/// 上次成功运行的水位
struct Watermark {
    last_run: Option<DateTime<Utc>>,
    /// 该次运行覆盖到的最新事件时间
    latest_event: Option<DateTime<Utc>>,
}

pub struct Aggregator {
    storage: Arc<SeaOrmStorage>,
    watermark: ArcSwap<Watermark>,
    refresh_interval: Duration,
    lag_threshold: ChronoDuration,
}

impl Aggregator {
    pub fn new(storage: Arc<SeaOrmStorage>, config: &AggregatorConfig) -> Self {
        Self {
            storage,
            watermark: ArcSwap::from_pointee(Watermark {
                last_run: None,
                latest_event: None,
            }),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs.max(1)),
            lag_threshold: ChronoDuration::seconds(config.lag_threshold_secs.max(1) as i64),
        }
    }

    /// 指定范围的汇总（幂等：同一事件集重算结果一致）
    pub async fn aggregate(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AnalyticsSummary> {
        let total_clicks = self.storage.count_clicks(code, from, to).await?;
        let (first_click, last_click) = self.storage.click_time_range(code, from, to).await?;

        Ok(AnalyticsSummary {
            code: code.to_string(),
            total_clicks,
            first_click,
            last_click,
            from,
            to,
        })
    }

    /// 时间序列（分桶在 SQL 侧完成）
    pub async fn timeseries(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Vec<TimeseriesPoint>> {
        let rows = self
            .storage
            .clicks_timeseries(code, from, to, granularity)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| TimeseriesPoint {
                bucket: row.bucket,
                clicks: row.count.max(0) as u64,
            })
            .collect())
    }

    /// referrer 统计：按固定税目归桶，百分比对总点击计算
    pub async fn referrers(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ReferrerStat>> {
        let rows = self.storage.referrer_rows(code, from, to).await?;

        // 原始 referrer -> 税目桶，在 Rust 侧归并
        let mut buckets: HashMap<&'static str, u64> = HashMap::new();
        let mut total: u64 = 0;
        for row in rows {
            let count = row.count.max(0) as u64;
            let label = classify_referrer(row.value.as_deref()).label();
            *buckets.entry(label).or_insert(0) += count;
            total += count;
        }

        let mut stats: Vec<ReferrerStat> = buckets
            .into_iter()
            .map(|(label, clicks)| ReferrerStat {
                referrer: label.to_string(),
                clicks,
                percentage: display_percentage(clicks, total),
            })
            .collect();

        // 点击数倒序，同数时按名称保证输出稳定（幂等性要求）
        stats.sort_by(|a, b| {
            b.clicks
                .cmp(&a.clicks)
                .then_with(|| a.referrer.cmp(&b.referrer))
        });
        Ok(stats)
    }

    /// 设备维度统计：UA 在聚合时解析
    pub async fn devices(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<DeviceStats> {
        let rows = self.storage.user_agent_rows(code, from, to).await?;

        let mut device_types: HashMap<String, u64> = HashMap::new();
        let mut browsers: HashMap<String, u64> = HashMap::new();
        let mut operating_systems: HashMap<String, u64> = HashMap::new();
        let mut total: u64 = 0;

        for row in rows {
            let count = row.count.max(0) as u64;
            let parsed = classify_user_agent(row.value.as_deref());
            *device_types
                .entry(parsed.device_type.label().to_string())
                .or_insert(0) += count;
            *browsers.entry(parsed.browser).or_insert(0) += count;
            *operating_systems.entry(parsed.os).or_insert(0) += count;
            total += count;
        }

        Ok(DeviceStats {
            device_types: to_sorted_categories(device_types, total),
            browsers: to_sorted_categories(browsers, total),
            operating_systems: to_sorted_categories(operating_systems, total),
        })
    }

    /// 地理维度统计
    pub async fn geo(
        &self,
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<GeoStats> {
        let rows = self.storage.geo_rows(code, from, to).await?;

        let mut by_country: HashMap<String, u64> = HashMap::new();
        let mut cities: Vec<CityStat> = Vec::new();
        let mut total: u64 = 0;

        for row in rows {
            let count = row.count.max(0) as u64;
            let country = row.country.unwrap_or_else(|| "Unknown".to_string());
            *by_country.entry(country.clone()).or_insert(0) += count;
            total += count;

            if let Some(city) = row.city {
                cities.push(CityStat {
                    country,
                    city,
                    clicks: count,
                });
            }
        }

        let mut countries: Vec<CountryStat> = by_country
            .into_iter()
            .map(|(country, clicks)| CountryStat {
                country,
                clicks,
                percentage: display_percentage(clicks, total),
            })
            .collect();
        countries.sort_by(|a, b| {
            b.clicks
                .cmp(&a.clicks)
                .then_with(|| a.country.cmp(&b.country))
        });
        cities.sort_by(|a, b| {
            b.clicks
                .cmp(&a.clicks)
                .then_with(|| a.city.cmp(&b.city))
        });

        Ok(GeoStats { countries, cities })
    }

    /// 单次后台刷新：推进成功运行水位
    pub async fn run_refresh_once(&self) -> Result<()> {
        let latest_event = self.storage.latest_event_at().await?;
        let now = Utc::now();

        self.watermark.store(Arc::new(Watermark {
            last_run: Some(now),
            latest_event,
        }));

        debug!(
            "Aggregator refresh completed: watermark={:?}",
            latest_event
        );
        Ok(())
    }

    /// 当前 lag 指标
    pub fn lag_info(&self) -> LagInfo {
        let watermark = self.watermark.load();
        let now = Utc::now();

        match watermark.last_run {
            None => LagInfo {
                lag_seconds: -1,
                delayed: true,
                message: "Analytics aggregation has not completed a run yet".to_string(),
            },
            Some(last_run) => {
                let lag = now - last_run;
                let delayed = lag > self.lag_threshold;
                let message = if delayed {
                    match watermark.latest_event {
                        Some(latest) => format!(
                            "Analytics data may be delayed (last aggregation {}s ago, events covered through {})",
                            lag.num_seconds(),
                            latest.to_rfc3339()
                        ),
                        None => format!(
                            "Analytics data may be delayed (last aggregation {}s ago)",
                            lag.num_seconds()
                        ),
                    }
                } else {
                    "Analytics data is up to date".to_string()
                };
                LagInfo {
                    lag_seconds: lag.num_seconds().max(0),
                    delayed,
                    message,
                }
            }
        }
    }

    /// 后台周期任务：与重定向路径完全独立
    pub async fn start_background_task(self: Arc<Self>) {
        info!(
            "Aggregator background task started (interval: {}s)",
            self.refresh_interval.as_secs()
        );
        loop {
            if let Err(e) = self.run_refresh_once().await {
                // 聚合失败只体现在 lag 指标上，绝不波及请求路径
                warn!("Aggregator refresh failed: {}", e);
            }
            sleep(self.refresh_interval).await;
        }
    }
}

fn to_sorted_categories(map: HashMap<String, u64>, total: u64) -> Vec<CategoryStat> {
    let mut stats: Vec<CategoryStat> = map
        .into_iter()
        .map(|(name, clicks)| CategoryStat {
            name,
            clicks,
            percentage: display_percentage(clicks, total),
        })
        .collect();
    stats.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.name.cmp(&b.name)));
    stats
}
