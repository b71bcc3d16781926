use thiserror::Error;

/// # Summary
/// 事件总线错误枚举。
///
/// # Invariants
/// - `Malformed` 必须在订阅循环边界被记录并吞掉，
///   单条坏消息不得中断订阅。
#[derive(Error, Debug)]
pub enum BusError {
    /// 载荷不是合法的 UTF-8 JSON，或与频道契约不符
    #[error("Malformed payload on channel {channel}: {reason}")]
    Malformed { channel: String, reason: String },
    /// 频道名不在线缆契约之内
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    /// 传输层关闭或不可用
    #[error("Bus unavailable: {0}")]
    Unavailable(String),
}
