use super::entity::{
    PnlSummary, Position, SignalId, TradeSignal, TradingConfig, User,
};
use super::error::SignalError;
use crate::common::ConfirmationSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// # Summary
/// 信号存储接口，持有每个交易信号的权威状态并仲裁确认/拒绝竞争。
///
/// # Invariants
/// - `confirm` / `reject` / `expire` 的状态检查与写入必须是存储层的
///   单次原子条件更新 ("set status where status = pending")，
///   不得实现为先读后写。
/// - 同一信号的并发终态迁移恰有一个成功，失败方收到 `AlreadyProcessed`。
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// # Summary
    /// 插入一条新的 pending 信号。
    ///
    /// # Logic
    /// 向 `trade_signals` 表写入完整记录。
    ///
    /// # Arguments
    /// * `signal`: 已生成 id 的信号实体。
    ///
    /// # Returns
    /// 操作结果。
    async fn insert(&self, signal: &TradeSignal) -> Result<(), SignalError>;

    /// # Summary
    /// 按 id 查询信号。
    ///
    /// # Returns
    /// 存在返回 `Some(TradeSignal)`，否则 `None`。
    async fn get(&self, id: &SignalId) -> Result<Option<TradeSignal>, SignalError>;

    /// # Summary
    /// 查询用户当前所有 pending 信号，按创建时间倒序。
    async fn pending_for_user(&self, user_id: &str) -> Result<Vec<TradeSignal>, SignalError>;

    /// # Summary
    /// 查询用户的信号历史 (含终态记录)，按创建时间倒序分页。
    async fn history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TradeSignal>, SignalError>;

    /// # Summary
    /// 确认信号：`pending -> confirmed`，并写入审计字段。
    ///
    /// # Logic
    /// 1. 执行条件更新 `SET status='confirmed', ... WHERE id=? AND status='pending'`。
    /// 2. 影响行数为 0 时回查记录，区分 `NotFound` 与 `AlreadyProcessed`。
    /// 3. 成功则返回更新后的完整记录。
    ///
    /// # Arguments
    /// * `id`: 信号标识。
    /// * `actor_id`: 发起确认的用户。
    /// * `source`: 确认来源界面。
    ///
    /// # Returns
    /// 更新后的记录，或 `SignalError`。
    async fn confirm(
        &self,
        id: &SignalId,
        actor_id: &str,
        source: ConfirmationSource,
    ) -> Result<TradeSignal, SignalError>;

    /// # Summary
    /// 拒绝信号：`pending -> rejected`，与 `confirm` 对称。
    async fn reject(
        &self,
        id: &SignalId,
        actor_id: &str,
        source: ConfirmationSource,
    ) -> Result<TradeSignal, SignalError>;

    /// # Summary
    /// 过期信号：`pending -> expired`，仅在仍为 pending 时生效，
    /// 永不覆盖已提交的确认/拒绝。
    async fn expire(&self, id: &SignalId) -> Result<TradeSignal, SignalError>;

    /// # Summary
    /// 到期清扫：将所有 `expires_at <= now` 的 pending 信号批量置为
    /// expired，并返回被置为过期的记录。
    ///
    /// # Logic
    /// 单条条件 UPDATE 完成批量迁移，随后按过期时刻回查受影响记录。
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<TradeSignal>, SignalError>;
}

/// # Summary
/// 用户存储接口，负责用户档案与 Discord 身份映射。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按 id 查询用户。
    async fn get_user(&self, id: &str) -> Result<Option<User>, SignalError>;

    /// 保存或更新用户。
    async fn save_user(&self, user: &User) -> Result<(), SignalError>;

    /// 查询用户绑定的 Discord ID。
    async fn discord_id_for(&self, user_id: &str) -> Result<Option<String>, SignalError>;

    /// 按 Discord ID 反查用户。
    async fn user_by_discord(&self, discord_user_id: &str)
    -> Result<Option<User>, SignalError>;

    /// 绑定用户与 Discord 账号。
    async fn link_discord(
        &self,
        user_id: &str,
        discord_user_id: &str,
    ) -> Result<(), SignalError>;
}

/// # Summary
/// 持仓读取接口。持仓的建立与盯市由外部执行引擎负责 (域外)，
/// 本接口只为命令面板与 REST 提供读路径。
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// 查询用户当前未平仓持仓。
    async fn open_positions(&self, user_id: &str) -> Result<Vec<Position>, SignalError>;

    /// 聚合用户盈亏汇总。
    async fn pnl_summary(&self, user_id: &str) -> Result<PnlSummary, SignalError>;

    /// 写入或更新一条持仓 (供测试与数据回灌使用)。
    async fn upsert_position(&self, position: &Position) -> Result<(), SignalError>;
}

/// # Summary
/// 用户交易配置存储接口。
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// 查询用户配置，不存在时返回默认配置。
    async fn trading_config(&self, user_id: &str) -> Result<TradingConfig, SignalError>;

    /// 保存用户配置。
    async fn save_trading_config(&self, config: &TradingConfig) -> Result<(), SignalError>;
}
