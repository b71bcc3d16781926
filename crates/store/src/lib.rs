//! # `vega-store` - SQLite 持久化层
//!
//! 实现 `vega-core` 中各存储端口的 SQLite 版本。信号的终态迁移
//! 通过单条条件 UPDATE (`... WHERE status = 'pending'`) 仲裁，
//! 这是整个系统里唯一承载互斥语义的地方。

pub mod config;
pub mod signal;
pub mod system;
