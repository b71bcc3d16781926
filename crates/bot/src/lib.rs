//! # `vega-bot` - Discord 桥
//!
//! 把总线上的信号事件渲染为带 Confirm / Reject / Details 按钮的
//! Discord 私信卡片，并把用户的按钮点击与文本命令翻译回信号台的
//! REST 调用。结构分四层：
//! - [`discord`]：`ChatPort` 的 Discord REST 实现 (下行消息)；
//! - [`gateway`]：最小化的 Discord Gateway WebSocket 客户端 (上行事件)；
//! - [`api_client`]：信号台 REST 的类型化客户端；
//! - [`bridge`] / [`commands`]：桥接逻辑本体与文本命令面板。

pub mod api_client;
pub mod bridge;
pub mod cards;
pub mod commands;
pub mod discord;
pub mod gateway;

pub use bridge::SignalBridge;
pub use discord::DiscordRest;
pub use gateway::DiscordGateway;
