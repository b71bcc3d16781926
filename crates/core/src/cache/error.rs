use thiserror::Error;

/// # Summary
/// 缓存层错误枚举。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug)]
pub enum CacheError {
    /// 序列化失败
    #[error("Serialize error: {0}")]
    Serialize(String),
    /// 反序列化失败
    #[error("Deserialize error: {0}")]
    Deserialize(String),
    /// 底层存储错误
    #[error("Storage error: {0}")]
    Storage(String),
}
