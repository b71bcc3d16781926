use crate::bus::error::BusError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// # Summary
/// 总线投递帧：字面频道名 + 原始 JSON 载荷。
/// 模式订阅者依靠 `channel` 区分实际命中的字面频道。
#[derive(Debug, Clone)]
pub struct BusFrame {
    pub channel: String,
    pub payload: String,
}

/// # Summary
/// 总线订阅流别名，使用动态分发的异步流。
/// 流结束 (返回 None) 仅发生在总线本身被销毁时。
pub type BusStream = Pin<Box<dyn Stream<Item = BusFrame> + Send>>;

/// # Summary
/// 事件总线接口：按频道名投递 JSON 事件，发布即忘。
///
/// # Invariants
/// - 至多一次投递：发布瞬间未在订阅的消费者永远收不到该消息，
///   无排队、无重放、无持久化。
/// - 单一生产者在单一频道上的发布顺序对每个订阅者保持先进先出；
///   跨频道、跨生产者无任何顺序保证。
/// - 模式订阅 (`positions:*`) 必须命中所有匹配的字面频道。
#[async_trait]
pub trait EventBus: Send + Sync {
    /// # Summary
    /// 向频道发布一条 JSON 载荷。
    ///
    /// # Logic
    /// 无订阅者时静默成功；不等待任何消费者确认。
    ///
    /// # Arguments
    /// * `channel`: 字面频道名。
    /// * `payload`: UTF-8 JSON 文本。
    ///
    /// # Returns
    /// 仅在总线自身不可用时返回 `BusError::Unavailable`。
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    /// # Summary
    /// 按精确频道名订阅。
    ///
    /// # Returns
    /// 从订阅时刻起的投递流。
    fn subscribe(&self, channel: &str) -> BusStream;

    /// # Summary
    /// 按 glob 模式订阅 (`*` 匹配任意字符序列，例如 `positions:*`)。
    ///
    /// # Returns
    /// 命中模式的所有字面频道的投递流。
    fn subscribe_pattern(&self, pattern: &str) -> BusStream;
}
