use thiserror::Error;

/// # Summary
/// 信号生命周期域的错误枚举。
///
/// # Invariants
/// - `NotFound` 与 `AlreadyProcessed` 是预期中的业务结果，
///   调用方必须将其映射为面向用户的非崩溃响应。
#[derive(Error, Debug)]
pub enum SignalError {
    /// 信号不存在
    #[error("Signal not found: {0}")]
    NotFound(String),
    /// 状态迁移竞争失败：信号已不在 pending 状态
    #[error("Signal already processed: {0}")]
    AlreadyProcessed(String),
    /// 输入校验失败 (操作者/来源/载荷非法)
    #[error("Validation error: {0}")]
    Validation(String),
    /// 存储层不可用或查询失败
    #[error("Database error: {0}")]
    Database(String),
}
