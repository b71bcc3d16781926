//! # `vega-cache` - 内存 KV 缓存
//!
//! `Cache` 端口的进程内实现，承载暂停标志与聊天身份解析等活性数据。
//! 活性缓存不是事实来源：进程重启即清空，由业务在运行中重建。

pub mod mem;

pub use mem::MemCache;
