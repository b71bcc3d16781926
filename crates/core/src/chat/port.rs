use crate::chat::entity::{CardUpdate, ChannelRef, MessageRef, SignalCard};
use crate::chat::error::ChatError;
use async_trait::async_trait;

/// # Summary
/// 聊天传输接口：向聊天平台投递与改写消息。
/// 生产实现为 Discord REST (见 `vega-bot`)；测试使用内存 Mock。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以支持并发调用。
/// - 所有方法都是发往外部平台的真实 I/O，失败以 `ChatError` 报告，
///   由调用方决定降级策略 (本系统一律"记录日志后丢弃"，不排队不重试)。
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// # Summary
    /// 打开 (或复用) 与指定 Discord 用户的私信频道。
    async fn open_dm(&self, discord_user_id: &str) -> Result<ChannelRef, ChatError>;

    /// # Summary
    /// 发送一张信号卡片，返回消息引用供后续编辑。
    async fn send_card(
        &self,
        channel: &ChannelRef,
        card: &SignalCard,
    ) -> Result<MessageRef, ChatError>;

    /// # Summary
    /// 将已渲染的卡片改写为终态视觉并摘除全部动作按钮。
    async fn update_card(
        &self,
        channel: &ChannelRef,
        message: &MessageRef,
        update: &CardUpdate,
    ) -> Result<(), ChatError>;

    /// # Summary
    /// 发送纯文本消息 (命令回复)。
    async fn send_text(&self, channel: &ChannelRef, text: &str) -> Result<(), ChatError>;

    /// # Summary
    /// 以临时消息 (仅操作者可见) 应答一次按钮交互。
    ///
    /// # Arguments
    /// * `interaction_id` / `interaction_token`: 平台交互句柄。
    /// * `card`: None 时仅发送 `text`。
    async fn ack_interaction(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        text: &str,
        card: Option<&SignalCard>,
    ) -> Result<(), ChatError>;
}
