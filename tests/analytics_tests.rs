//! Analytics aggregation integration tests
//!
//! 核心不变量：
//! - 同一事件集上重复聚合得到逐字节一致的结果（幂等）
//! - 任何维度的分桶计数之和等于该范围的总点击数
//! - lag 指标随后台刷新收敛

use std::sync::Arc;
use std::sync::Once;

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use linkhub::analytics::{Aggregator, ClickSink, Granularity};
use linkhub::config::{init_config, AggregatorConfig};
use linkhub::storage::backend::{connect_sqlite, run_migrations};
use linkhub::storage::models::StoredClickEvent;
use linkhub::storage::SeaOrmStorage;

static INIT: Once = Once::new();

fn init_static_config() {
    INIT.call_once(init_config);
}

async fn setup() -> (Arc<SeaOrmStorage>, Arc<Aggregator>, TempDir) {
    init_static_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("analytics_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let db = connect_sqlite(&db_url).await.expect("connect failed");
    run_migrations(&db).await.expect("migrations failed");

    let storage = Arc::new(SeaOrmStorage::from_connection(db, "sqlite"));
    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&storage),
        &AggregatorConfig::default(),
    ));

    (storage, aggregator, temp_dir)
}

fn event(
    code: &str,
    at: DateTime<Utc>,
    referrer: Option<&str>,
    user_agent: Option<&str>,
    country: Option<&str>,
    city: Option<&str>,
) -> StoredClickEvent {
    StoredClickEvent {
        code: code.to_string(),
        clicked_at: at,
        referrer: referrer.map(String::from),
        user_agent: user_agent.map(String::from),
        country: country.map(String::from),
        city: city.map(String::from),
    }
}

/// N 天前的正午（避免小时偏移把事件推过日界，导致日桶数量抖动）
fn days_ago_noon(days: i64) -> DateTime<Utc> {
    (Utc::now() - Duration::days(days))
        .date_naive()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc()
}

const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// 固定的事件集：3 天、5 个 referrer 桶、3 种 UA、2 个国家
async fn seed_events(storage: &SeaOrmStorage, code: &str, base: DateTime<Utc>) {
    let events = vec![
        // 第 1 天：2 次 Google 来源、桌面端、德国
        event(code, base, Some("https://www.google.com/search?q=x"), Some(CHROME_WIN), Some("Germany"), Some("Berlin")),
        event(code, base + Duration::minutes(5), Some("https://google.com/"), Some(CHROME_WIN), Some("Germany"), Some("Munich")),
        // 第 2 天：直接访问 + Twitter，移动端，日本
        event(code, base + Duration::days(1), None, Some(SAFARI_IPHONE), Some("Japan"), Some("Tokyo")),
        event(code, base + Duration::days(1) + Duration::hours(2), Some("https://t.co/xyz"), Some(SAFARI_IPHONE), Some("Japan"), None),
        // 第 3 天：爬虫 + 未知来源站点，无地理信息
        event(code, base + Duration::days(2), Some("https://blog.example.net/post"), Some(GOOGLEBOT), None, None),
        event(code, base + Duration::days(2) + Duration::hours(1), None, None, None, None),
    ];

    storage
        .insert_events(events)
        .await
        .expect("seeding events failed");
}

#[actix_rt::test]
async fn test_aggregate_is_idempotent_byte_for_byte() {
    let (storage, aggregator, _dir) = setup().await;
    let base = days_ago_noon(3);
    seed_events(&storage, "idem-code", base).await;

    let from = base - Duration::hours(1);
    let to = Utc::now();

    let first = aggregator.aggregate("idem-code", from, to).await.unwrap();
    let second = aggregator.aggregate("idem-code", from, to).await.unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );

    let ref_a = aggregator.referrers("idem-code", from, to).await.unwrap();
    let ref_b = aggregator.referrers("idem-code", from, to).await.unwrap();
    assert_eq!(
        serde_json::to_vec(&ref_a).unwrap(),
        serde_json::to_vec(&ref_b).unwrap()
    );

    let dev_a = aggregator.devices("idem-code", from, to).await.unwrap();
    let dev_b = aggregator.devices("idem-code", from, to).await.unwrap();
    assert_eq!(
        serde_json::to_vec(&dev_a).unwrap(),
        serde_json::to_vec(&dev_b).unwrap()
    );
}

#[actix_rt::test]
async fn test_bucket_sums_equal_total_clicks() {
    let (storage, aggregator, _dir) = setup().await;
    let base = days_ago_noon(3);
    seed_events(&storage, "sums-code", base).await;

    let from = base - Duration::hours(1);
    let to = Utc::now();

    let summary = aggregator.aggregate("sums-code", from, to).await.unwrap();
    assert_eq!(summary.total_clicks, 6);

    // referrer 桶之和 == 总数
    let referrers = aggregator.referrers("sums-code", from, to).await.unwrap();
    let referrer_sum: u64 = referrers.iter().map(|r| r.clicks).sum();
    assert_eq!(referrer_sum, summary.total_clicks);

    // 设备类型桶之和 == 总数（browser/os 同理，同一数据源）
    let devices = aggregator.devices("sums-code", from, to).await.unwrap();
    let device_sum: u64 = devices.device_types.iter().map(|d| d.clicks).sum();
    assert_eq!(device_sum, summary.total_clicks);
    let browser_sum: u64 = devices.browsers.iter().map(|d| d.clicks).sum();
    assert_eq!(browser_sum, summary.total_clicks);

    // 地理桶之和 == 总数（无地理信息的归入 Unknown）
    let geo = aggregator.geo("sums-code", from, to).await.unwrap();
    let country_sum: u64 = geo.countries.iter().map(|c| c.clicks).sum();
    assert_eq!(country_sum, summary.total_clicks);

    // 时间序列之和 == 总数
    let series = aggregator
        .timeseries("sums-code", from, to, Granularity::Day)
        .await
        .unwrap();
    let series_sum: u64 = series.iter().map(|p| p.clicks).sum();
    assert_eq!(series_sum, summary.total_clicks);
    assert_eq!(series.len(), 3);
}

#[actix_rt::test]
async fn test_referrer_taxonomy_buckets() {
    let (storage, aggregator, _dir) = setup().await;
    let base = days_ago_noon(3);
    seed_events(&storage, "tax-code", base).await;

    let from = base - Duration::hours(2);
    let to = Utc::now();

    let referrers = aggregator.referrers("tax-code", from, to).await.unwrap();
    let find = |name: &str| {
        referrers
            .iter()
            .find(|r| r.referrer == name)
            .map(|r| r.clicks)
            .unwrap_or(0)
    };

    assert_eq!(find("Google"), 2);
    assert_eq!(find("Direct"), 2);
    assert_eq!(find("Twitter / X"), 1);
    assert_eq!(find("Other"), 1);

    // 百分比对总数计算，两位小数
    let google = referrers.iter().find(|r| r.referrer == "Google").unwrap();
    assert_eq!(google.percentage, 33.33);
}

#[actix_rt::test]
async fn test_device_classification_at_aggregation_time() {
    let (storage, aggregator, _dir) = setup().await;
    let base = days_ago_noon(3);
    seed_events(&storage, "dev-code", base).await;

    let from = base - Duration::hours(2);
    let to = Utc::now();

    let devices = aggregator.devices("dev-code", from, to).await.unwrap();
    let device_of = |name: &str| {
        devices
            .device_types
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.clicks)
            .unwrap_or(0)
    };

    assert_eq!(device_of("Desktop"), 2);
    assert_eq!(device_of("Mobile"), 2);
    assert_eq!(device_of("Bot"), 1);
    assert_eq!(device_of("Other"), 1); // UA 缺失

    let browser_of = |name: &str| {
        devices
            .browsers
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.clicks)
            .unwrap_or(0)
    };
    assert_eq!(browser_of("Chrome"), 2);
}

#[actix_rt::test]
async fn test_geo_breakdown() {
    let (storage, aggregator, _dir) = setup().await;
    let base = days_ago_noon(3);
    seed_events(&storage, "geo-code", base).await;

    let from = base - Duration::hours(2);
    let to = Utc::now();

    let geo = aggregator.geo("geo-code", from, to).await.unwrap();
    let country_of = |name: &str| {
        geo.countries
            .iter()
            .find(|c| c.country == name)
            .map(|c| c.clicks)
            .unwrap_or(0)
    };

    assert_eq!(country_of("Germany"), 2);
    assert_eq!(country_of("Japan"), 2);
    assert_eq!(country_of("Unknown"), 2);

    // 城市行只包含有城市信息的事件
    assert!(geo.cities.iter().any(|c| c.city == "Berlin"));
    assert!(geo.cities.iter().any(|c| c.city == "Tokyo"));
}

#[actix_rt::test]
async fn test_range_filter_excludes_out_of_window_events() {
    let (storage, aggregator, _dir) = setup().await;
    let base = days_ago_noon(10);
    seed_events(&storage, "win-code", base).await;

    // 只取最后一天的窗口
    let from = base + Duration::days(2) - Duration::hours(1);
    let to = Utc::now();

    let summary = aggregator.aggregate("win-code", from, to).await.unwrap();
    assert_eq!(summary.total_clicks, 2);

    let referrers = aggregator.referrers("win-code", from, to).await.unwrap();
    let sum: u64 = referrers.iter().map(|r| r.clicks).sum();
    assert_eq!(sum, 2);
}

#[actix_rt::test]
async fn test_empty_range_yields_empty_stats() {
    let (_storage, aggregator, _dir) = setup().await;

    let from = Utc::now() - Duration::days(1);
    let to = Utc::now();

    let summary = aggregator.aggregate("no-events", from, to).await.unwrap();
    assert_eq!(summary.total_clicks, 0);
    assert!(summary.first_click.is_none());

    assert!(aggregator.referrers("no-events", from, to).await.unwrap().is_empty());
    assert!(aggregator
        .timeseries("no-events", from, to, Granularity::Day)
        .await
        .unwrap()
        .is_empty());
}

#[actix_rt::test]
async fn test_lag_indicator_converges_after_refresh() {
    let (_storage, aggregator, _dir) = setup().await;

    // 从未运行过：delayed，信息明确
    let before = aggregator.lag_info();
    assert!(before.delayed);

    aggregator.run_refresh_once().await.unwrap();

    let after = aggregator.lag_info();
    assert!(!after.delayed);
    assert!(after.lag_seconds < 5);
    assert!(after.message.contains("up to date"));
}
