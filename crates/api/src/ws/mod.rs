//! # WebSocket 扇出层
//!
//! 将事件总线上的域事件转投到按用户划分的实时房间：
//! - `rooms`：`UserId -> broadcast::Sender` 的内存注册表 (活性缓存，
//!   进程重启即清空，由客户端重新 authenticate 重建)；
//! - `fanout`：订阅总线并按 `user_id` 路由的后台协程；
//! - `handler`：单个 WebSocket 连接的协议循环
//!   (authenticate / ping / 服务端推送)。

pub mod fanout;
pub mod handler;
pub mod rooms;

pub use rooms::{PushEvent, RoomRegistry};
