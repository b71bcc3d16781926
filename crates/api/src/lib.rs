//! # `vega-api` - HTTP/WebSocket 网关
//!
//! 本 crate 是 Vega 期权信号台的对外服务入口。
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 接收来自浏览器前端与 Discord 桥的 HTTP 请求
//! - 执行 JWT 鉴权后分发至各路由控制器
//! - 调用下层 `SignalService` 与各存储端口完成业务操作
//! - 订阅事件总线并将事件扇出到按用户划分的 WebSocket 房间
//! - 将领域模型转换为 DTO 返回给调用方

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;
pub mod ws;
