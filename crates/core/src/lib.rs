//! # `vega-core` - 领域内核
//!
//! 定义整个期权信号台 (Vega) 的实体、端口 (Port) 与错误类型。
//! 本 crate 不做任何 I/O：具体实现分别位于 `vega-store` (SQLite)、
//! `vega-bus` (进程内事件总线)、`vega-cache` (内存 KV) 与 `vega-bot`
//! (Discord 桥) 中，由 `vega-app` 在启动时通过 `Arc<dyn Trait>` 注入。

pub mod bus;
pub mod cache;
pub mod chat;
pub mod common;
pub mod config;
pub mod signal;
