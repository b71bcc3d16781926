//! # `vega-signal` - 信号生命周期服务
//!
//! 应用服务层门面：校验输入、委托存储层的条件更新仲裁终态迁移，
//! 并在每次成功迁移后向总线发布回声事件 (`signals:updated`)，
//! 让未发起操作的那个界面得以同步自己的渲染。
//! 到期清扫器 (`ExpirySweeper`) 是系统中唯一权威的过期来源，
//! 消费者本地计时器只是乐观 UI。

pub mod service;
pub mod sweeper;

pub use service::SignalService;
pub use sweeper::ExpirySweeper;
