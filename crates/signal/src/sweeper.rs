use crate::service::SignalService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// # Summary
/// 到期清扫器：周期性地将所有到点的 pending 信号置为 expired。
/// 这是系统中唯一权威的过期来源；聊天界面的本地计时器只是
/// 乐观 UI，最终以清扫产生的 `signals:updated` 回声为准。
///
/// # Invariants
/// - 清扫永不覆盖已提交的确认/拒绝 (存储层条件更新保证)。
/// - 单轮清扫失败只记录日志，下一轮继续。
pub struct ExpirySweeper {
    service: Arc<SignalService>,
    interval: Duration,
}

impl ExpirySweeper {
    /// # Summary
    /// 创建清扫器。
    ///
    /// # Arguments
    /// * `service` - 信号生命周期服务。
    /// * `interval` - 清扫周期。
    pub fn new(service: Arc<SignalService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// # Summary
    /// 启动后台清扫协程，返回句柄供宿主管理生命周期。
    ///
    /// # Logic
    /// 1. 按固定周期 tick。
    /// 2. 每轮调用 `sweep_expired(now)`，错误记录后继续。
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Expiry sweeper started (every {:?})", self.interval);
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                match self.service.sweep_expired(Utc::now()).await {
                    Ok(expired) if !expired.is_empty() => {
                        info!("Expiry sweep marked {} signal(s) expired", expired.len());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Expiry sweep failed: {}", e),
                }
            }
        })
    }
}
