use thiserror::Error;

/// # Summary
/// 聊天桥接层错误枚举。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug)]
pub enum ChatError {
    /// 网络连接或传输错误
    #[error("Network error: {0}")]
    Network(String),

    /// 配置错误 (如缺少 Bot Token)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 聊天平台返回的错误 (如 Discord API Error)
    #[error("Platform error: {0}")]
    Platform(String),

    /// 身份解析失败：用户未绑定聊天账号
    #[error("Chat identity not linked for user {0}")]
    IdentityUnresolved(String),
}
