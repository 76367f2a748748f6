use crate::storage::models::StoredClickEvent;

/// 点击数据落盘端
///
/// 两条写路径：计数批量累加和原始事件批量插入。
/// 实现方内部负责有界重试，返回 Err 即表示重试已耗尽。
#[async_trait::async_trait]
pub trait ClickSink: Send + Sync {
    /// 批量累加 click_count（code -> 增量）
    async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()>;

    /// 批量插入原始点击事件
    async fn insert_events(&self, events: Vec<StoredClickEvent>) -> anyhow::Result<()>;
}
