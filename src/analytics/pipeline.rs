//! 点击事件管线
//!
//! 把事件捕获与事件落盘解耦：生产端是重定向热路径上的一次
//! try_send（有界、恒定耗时、永不阻塞），消费端是独立 tokio 任务，
//! 按批量条数或时间窗口先到先触发地写库。
//!
//! 队列满时丢弃最新事件并递增计数器 —— 丢点击可以接受，
//! 重定向路径卡顿不可以。落盘失败时存储层先做有界退避重试，
//! 重试耗尽后整批丢弃并记日志，分析数据显式 best-effort。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{ClickEvent, ClickSink};
use crate::config::PipelineConfig;
use crate::services::geoip::GeoIpProvider;
use crate::storage::models::StoredClickEvent;

/// 管线内部计数器
#[derive(Default)]
struct PipelineStats {
    enqueued: AtomicU64,
    /// 背压丢弃计数，单调递增
    dropped: AtomicU64,
    flushed_batches: AtomicU64,
    failed_batches: AtomicU64,
    persisted_events: AtomicU64,
}

/// 对外暴露的计数快照（健康检查 / 测试用）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub flushed_batches: u64,
    pub failed_batches: u64,
    pub persisted_events: u64,
}

/// 点击事件管线生产端句柄
///
/// Clone 廉价；所有句柄与内部 Sender 全部 drop 后，消费任务会
/// 清空余量、做最后一次 flush 然后退出。
#[derive(Clone)]
pub struct ClickPipeline {
    tx: mpsc::Sender<ClickEvent>,
    stats: Arc<PipelineStats>,
}

impl ClickPipeline {
    /// 启动管线，返回生产端句柄和消费任务句柄
    pub fn start(
        sink: Arc<dyn ClickSink>,
        geoip: Option<Arc<GeoIpProvider>>,
        config: &PipelineConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<ClickEvent>(config.queue_capacity.max(1));
        let stats = Arc::new(PipelineStats::default());

        let consumer_stats = Arc::clone(&stats);
        let batch_size = config.batch_size.max(1);
        let flush_interval = Duration::from_secs(config.flush_interval_secs.max(1));

        let handle = tokio::spawn(run_consumer(
            rx,
            sink,
            geoip,
            batch_size,
            flush_interval,
            consumer_stats,
        ));

        debug!(
            "ClickPipeline started: capacity={}, batch_size={}, flush_interval={}s",
            config.queue_capacity,
            batch_size,
            flush_interval.as_secs()
        );

        (Self { tx, stats }, handle)
    }

    /// 入队一个点击事件
    ///
    /// 恒定耗时，绝不阻塞调用方。队列满时丢弃该事件并返回 false，
    /// 丢弃只体现为内部计数，永不上浮为用户可见错误。
    pub fn enqueue(&self, event: ClickEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(
                    "Click event dropped (queue full): code={}, total_dropped={}",
                    event.code,
                    dropped
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// 当前计数快照
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            enqueued: self.stats.enqueued.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            flushed_batches: self.stats.flushed_batches.load(Ordering::Relaxed),
            failed_batches: self.stats.failed_batches.load(Ordering::Relaxed),
            persisted_events: self.stats.persisted_events.load(Ordering::Relaxed),
        }
    }
}

/// 消费任务主循环
async fn run_consumer(
    mut rx: mpsc::Receiver<ClickEvent>,
    sink: Arc<dyn ClickSink>,
    geoip: Option<Arc<GeoIpProvider>>,
    batch_size: usize,
    flush_interval: Duration,
    stats: Arc<PipelineStats>,
) {
    let mut batch: Vec<ClickEvent> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // interval 的第一个 tick 立即到期，跳过
    ticker.tick().await;

    loop {
        tokio::select! {
            maybe_event = rx.recv() => match maybe_event {
                Some(event) => {
                    batch.push(event);
                    if batch.len() >= batch_size {
                        flush_batch(&sink, geoip.as_deref(), &mut batch, &stats).await;
                    }
                }
                None => {
                    // 所有生产端句柄已 drop：清空余量后退出
                    flush_batch(&sink, geoip.as_deref(), &mut batch, &stats).await;
                    debug!("Click pipeline consumer stopped (channel closed)");
                    break;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush_batch(&sink, geoip.as_deref(), &mut batch, &stats).await;
                }
            }
        }
    }
}

/// 落盘一批事件：先地理富化，再写事件日志 + 累加计数
async fn flush_batch(
    sink: &Arc<dyn ClickSink>,
    geoip: Option<&GeoIpProvider>,
    batch: &mut Vec<ClickEvent>,
    stats: &PipelineStats,
) {
    if batch.is_empty() {
        return;
    }

    let events: Vec<ClickEvent> = std::mem::take(batch);
    let count = events.len();

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut stored: Vec<StoredClickEvent> = Vec::with_capacity(count);

    for event in &events {
        *counts.entry(event.code.clone()).or_insert(0) += 1;

        // IP 只在这里使用：推导出地理字段后即弃，不落盘
        let geo = event
            .ip_address
            .as_deref()
            .and_then(|ip| geoip.and_then(|g| g.lookup(ip)));

        stored.push(StoredClickEvent {
            code: event.code.clone(),
            clicked_at: event.timestamp,
            referrer: event.referrer.clone(),
            user_agent: event.user_agent.clone(),
            country: geo.as_ref().and_then(|g| g.country.clone()),
            city: geo.as_ref().and_then(|g| g.city.clone()),
        });
    }

    let updates: Vec<(String, usize)> = counts.into_iter().collect();

    let mut failed = false;

    if let Err(e) = sink.insert_events(stored).await {
        warn!(
            "Click pipeline: dropping batch of {} events after retries: {}",
            count, e
        );
        failed = true;
    }

    if let Err(e) = sink.flush_clicks(updates).await {
        warn!(
            "Click pipeline: dropping click count updates for batch of {}: {}",
            count, e
        );
        failed = true;
    }

    if failed {
        stats.failed_batches.fetch_add(1, Ordering::Relaxed);
    } else {
        stats.flushed_batches.fetch_add(1, Ordering::Relaxed);
        stats
            .persisted_events
            .fetch_add(count as u64, Ordering::Relaxed);
        trace!("Click pipeline: flushed batch of {} events", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockSink {
        events: Mutex<Vec<StoredClickEvent>>,
        counts: Mutex<Vec<(String, usize)>>,
    }

    impl MockSink {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                counts: Mutex::new(Vec::new()),
            }
        }

        fn total_events(&self) -> usize {
            self.events.lock().unwrap().len()
        }

        fn total_counted(&self) -> usize {
            self.counts.lock().unwrap().iter().map(|(_, c)| c).sum()
        }
    }

    #[async_trait::async_trait]
    impl ClickSink for MockSink {
        async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()> {
            self.counts.lock().unwrap().extend(updates);
            Ok(())
        }

        async fn insert_events(&self, events: Vec<StoredClickEvent>) -> anyhow::Result<()> {
            self.events.lock().unwrap().extend(events);
            Ok(())
        }
    }

    /// 卡死的 sink：让消费端停在第一次 flush 上
    struct StuckSink;

    #[async_trait::async_trait]
    impl ClickSink for StuckSink {
        async fn flush_clicks(&self, _updates: Vec<(String, usize)>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn insert_events(&self, _events: Vec<StoredClickEvent>) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn small_config(queue_capacity: usize, batch_size: usize) -> PipelineConfig {
        PipelineConfig {
            queue_capacity,
            batch_size,
            flush_interval_secs: 1,
        }
    }

    fn event(code: &str) -> ClickEvent {
        ClickEvent::new(code.to_string())
    }

    #[tokio::test]
    async fn test_drain_on_shutdown_persists_everything() {
        let sink = Arc::new(MockSink::new());
        let (pipeline, handle) = ClickPipeline::start(
            Arc::clone(&sink) as Arc<dyn ClickSink>,
            None,
            &small_config(1024, 256),
        );

        assert!(pipeline.enqueue(event("code0001")));
        assert!(pipeline.enqueue(event("code0001")));
        assert!(pipeline.enqueue(event("code0002")));

        drop(pipeline);
        handle.await.unwrap();

        assert_eq!(sink.total_events(), 3);
        assert_eq!(sink.total_counted(), 3);
    }

    #[tokio::test]
    async fn test_batch_size_triggers_flush() {
        let sink = Arc::new(MockSink::new());
        let (pipeline, handle) = ClickPipeline::start(
            Arc::clone(&sink) as Arc<dyn ClickSink>,
            None,
            &small_config(1024, 4),
        );

        for _ in 0..8 {
            assert!(pipeline.enqueue(event("hotcode1")));
        }

        // 两个整批应在时间窗口之前就被触发
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                if sink.total_events() >= 8 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("batches were not flushed in time");

        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.enqueued, 8);
        assert_eq!(snapshot.dropped, 0);
        assert!(snapshot.flushed_batches >= 2);

        drop(pipeline);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_saturation_drops_instead_of_blocking() {
        let (pipeline, handle) = ClickPipeline::start(
            Arc::new(StuckSink) as Arc<dyn ClickSink>,
            None,
            &small_config(4, 1),
        );

        // 消费端会取走第一个事件然后卡在 flush 上，
        // 队列装满后剩下的全部立即被丢弃
        let start = std::time::Instant::now();
        let mut accepted = 0usize;
        for i in 0..64 {
            if pipeline.enqueue(event(&format!("code{:04}", i))) {
                accepted += 1;
            }
        }
        let elapsed = start.elapsed();

        // 有界恒定耗时：64 次 try_send 必须瞬间完成
        assert!(elapsed < Duration::from_millis(500), "enqueue blocked: {:?}", elapsed);

        let snapshot = pipeline.snapshot();
        assert!(snapshot.dropped > 0, "expected drops under saturation");
        assert_eq!(snapshot.enqueued as usize, accepted);
        assert_eq!(snapshot.enqueued + snapshot.dropped, 64);

        // 丢弃计数只增不减
        pipeline.enqueue(event("one-more1"));
        let after = pipeline.snapshot();
        assert!(after.dropped >= snapshot.dropped);

        handle.abort();
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing_below_capacity() {
        let sink = Arc::new(MockSink::new());
        let (pipeline, handle) = ClickPipeline::start(
            Arc::clone(&sink) as Arc<dyn ClickSink>,
            None,
            &small_config(8192, 256),
        );

        const TASKS: usize = 10;
        const PER_TASK: usize = 100;

        let mut join_set = Vec::new();
        for _ in 0..TASKS {
            let p = pipeline.clone();
            join_set.push(tokio::spawn(async move {
                for _ in 0..PER_TASK {
                    p.enqueue(event("shared01"));
                }
            }));
        }
        for j in join_set {
            j.await.unwrap();
        }

        drop(pipeline);
        handle.await.unwrap();

        assert_eq!(sink.total_events(), TASKS * PER_TASK);
        assert_eq!(sink.total_counted(), TASKS * PER_TASK);
    }
}
