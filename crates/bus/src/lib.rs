//! # `vega-bus` - 进程内事件总线
//!
//! `EventBus` 端口的进程内实现：按频道名组织的 `broadcast` 通道注册表，
//! 外加 glob 模式订阅。语义对齐频道化 pub/sub 的线缆契约：
//! 发布即忘、至多一次、无重放。

pub mod memory;

pub use memory::InProcessBus;
