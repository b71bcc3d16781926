use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use vega_core::bus::entity::{
    CHANNEL_SIGNALS_ALL, CHANNEL_SIGNALS_UPDATED, Notification, user_notifications_channel,
    user_signals_channel,
};
use vega_core::bus::port::EventBus;
use vega_core::cache::error::CacheError;
use vega_core::cache::port::{Cache, CacheExt, trading_paused_key};
use vega_core::common::ConfirmationSource;
use vega_core::signal::entity::{NewSignal, SignalId, SignalStatus, TradeSignal};
use vega_core::signal::error::SignalError;
use vega_core::signal::port::SignalStore;

/// # Summary
/// 信号生命周期服务，系统的应用服务层门面 (Facade)。
/// 编译期仅依赖 `vega-core` 中的 Trait 定义，具体实现通过构造函数注入。
///
/// # Invariants
/// - 终态迁移的并发仲裁完全委托给存储层的条件更新，本层不加锁。
/// - 每次成功迁移都会发布 `signals:updated` 回声；发布失败仅记录
///   日志，不回滚已提交的迁移 (总线本就是至多一次的)。
pub struct SignalService {
    // 信号持久化接口
    store: Arc<dyn SignalStore>,
    // 事件总线接口
    bus: Arc<dyn EventBus>,
    // 活性缓存 (暂停标志)
    cache: Arc<dyn Cache>,
}

impl SignalService {
    /// # Summary
    /// 创建 SignalService 实例。
    ///
    /// # Arguments
    /// * `store` - 信号存储的具体实现。
    /// * `bus` - 事件总线的具体实现。
    /// * `cache` - 活性缓存的具体实现。
    ///
    /// # Returns
    /// * `Arc<Self>` - 可共享的服务实例。
    pub fn new(
        store: Arc<dyn SignalStore>,
        bus: Arc<dyn EventBus>,
        cache: Arc<dyn Cache>,
    ) -> Arc<Self> {
        Arc::new(Self { store, bus, cache })
    }

    /// # Summary
    /// 创建一条新的 pending 信号并广播给所有实时界面。
    ///
    /// # Logic
    /// 1. 校验输入 (归属、数量、置信度、失效时间)。
    /// 2. 生成 id 与时间戳，落库为 pending。
    /// 3. 将全量记录发布到 `signals:all` 与 `signals:<uid>`。
    ///
    /// # Arguments
    /// * `input` - 信号生成方提供的载荷。
    ///
    /// # Returns
    /// * 已落库的完整记录。
    pub async fn create(&self, input: NewSignal) -> Result<TradeSignal, SignalError> {
        if input.user_id.trim().is_empty() {
            return Err(SignalError::Validation("user_id must not be empty".into()));
        }
        if input.symbol.trim().is_empty() {
            return Err(SignalError::Validation("symbol must not be empty".into()));
        }
        if input.quantity <= 0 {
            return Err(SignalError::Validation("quantity must be positive".into()));
        }
        if let Some(score) = input.confidence_score
            && !(0.0..=100.0).contains(&score)
        {
            return Err(SignalError::Validation(
                "confidence_score must be within [0, 100]".into(),
            ));
        }
        let now = Utc::now();
        if input.expires_at <= now {
            return Err(SignalError::Validation(
                "expires_at must be in the future".into(),
            ));
        }

        let signal = TradeSignal {
            id: SignalId::generate(),
            user_id: input.user_id,
            symbol: input.symbol,
            strategy_type: input.strategy_type,
            action: input.action,
            option_symbol: input.option_symbol,
            strike_price: input.strike_price,
            expiration_date: input.expiration_date,
            option_type: input.option_type,
            quantity: input.quantity,
            limit_price: input.limit_price,
            confidence_score: input.confidence_score,
            reasoning: input.reasoning,
            market_conditions: input.market_conditions,
            status: SignalStatus::Pending,
            confirmation_source: None,
            confirmed_at: None,
            confirmed_by: None,
            expires_at: input.expires_at,
            created_at: now,
        };

        self.store.insert(&signal).await?;
        info!("Signal {} created for {} ({})", signal.id, signal.user_id, signal.symbol);

        self.publish_json(CHANNEL_SIGNALS_ALL, &signal).await;
        self.publish_json(&user_signals_channel(&signal.user_id), &signal)
            .await;

        Ok(signal)
    }

    /// # Summary
    /// 确认信号。成功后发布回声与用户通知。
    ///
    /// # Arguments
    /// * `id` - 信号标识。
    /// * `actor_id` - 发起确认的用户。
    /// * `source` - 确认来源界面。
    ///
    /// # Returns
    /// * 迁移后的完整记录；竞争失败返回 `AlreadyProcessed`。
    pub async fn confirm(
        &self,
        id: &SignalId,
        actor_id: &str,
        source: ConfirmationSource,
    ) -> Result<TradeSignal, SignalError> {
        validate_actor(actor_id)?;
        let signal = self.store.confirm(id, actor_id, source).await?;
        info!("Signal {} confirmed by {} via {}", id, actor_id, source);

        self.echo_transition(&signal, "Signal confirmed").await;
        Ok(signal)
    }

    /// # Summary
    /// 拒绝信号，与 `confirm` 对称。
    pub async fn reject(
        &self,
        id: &SignalId,
        actor_id: &str,
        source: ConfirmationSource,
    ) -> Result<TradeSignal, SignalError> {
        validate_actor(actor_id)?;
        let signal = self.store.reject(id, actor_id, source).await?;
        info!("Signal {} rejected by {} via {}", id, actor_id, source);

        self.echo_transition(&signal, "Signal rejected").await;
        Ok(signal)
    }

    /// # Summary
    /// 过期单条信号 (仅在仍为 pending 时生效)。
    pub async fn expire(&self, id: &SignalId) -> Result<TradeSignal, SignalError> {
        let signal = self.store.expire(id).await?;
        info!("Signal {} expired", id);

        self.echo_transition(&signal, "Signal expired").await;
        Ok(signal)
    }

    /// # Summary
    /// 到期清扫：过期所有到点的 pending 信号并逐条发布回声。
    ///
    /// # Returns
    /// * 本轮被置为过期的记录。
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<TradeSignal>, SignalError> {
        let expired = self.store.expire_due(now).await?;
        for signal in &expired {
            info!("Signal {} expired by sweep", signal.id);
            self.echo_transition(signal, "Signal expired").await;
        }
        Ok(expired)
    }

    /// # Summary
    /// 按 id 查询信号。
    pub async fn get(&self, id: &SignalId) -> Result<Option<TradeSignal>, SignalError> {
        self.store.get(id).await
    }

    /// # Summary
    /// 查询用户的 pending 信号列表。
    pub async fn pending_for_user(&self, user_id: &str) -> Result<Vec<TradeSignal>, SignalError> {
        self.store.pending_for_user(user_id).await
    }

    /// # Summary
    /// 查询用户的信号历史。
    pub async fn history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TradeSignal>, SignalError> {
        self.store.history(user_id, limit, offset).await
    }

    /// # Summary
    /// 暂停用户的信号生成 (写入缓存标志)。
    pub async fn pause_trading(&self, user_id: &str) -> Result<(), SignalError> {
        self.cache
            .set(&trading_paused_key(user_id), &true)
            .await
            .map_err(cache_err)?;
        info!("Trading paused for user {}", user_id);
        Ok(())
    }

    /// # Summary
    /// 恢复用户的信号生成 (删除缓存标志)。
    pub async fn resume_trading(&self, user_id: &str) -> Result<(), SignalError> {
        self.cache
            .del(&trading_paused_key(user_id))
            .await
            .map_err(cache_err)?;
        info!("Trading resumed for user {}", user_id);
        Ok(())
    }

    /// # Summary
    /// 查询用户的暂停状态。
    pub async fn is_paused(&self, user_id: &str) -> Result<bool, SignalError> {
        let flag: Option<bool> = self
            .cache
            .get(&trading_paused_key(user_id))
            .await
            .map_err(cache_err)?;
        Ok(flag.unwrap_or(false))
    }

    /// 成功迁移后的统一副作用：回声事件 + 用户通知。
    async fn echo_transition(&self, signal: &TradeSignal, title: &str) {
        self.publish_json(CHANNEL_SIGNALS_UPDATED, signal).await;

        let notification = Notification {
            user_id: signal.user_id.clone(),
            title: title.to_string(),
            message: format!("{} {} ({})", signal.symbol, signal.option_symbol, signal.status),
            kind: "signal".to_string(),
        };
        self.publish_json(&user_notifications_channel(&signal.user_id), &notification)
            .await;
    }

    /// 序列化并发布；任何失败只记录日志，不影响已提交的状态。
    async fn publish_json<T: Serialize>(&self, channel: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to encode payload for {}: {}", channel, e);
                return;
            }
        };
        if let Err(e) = self.bus.publish(channel, &payload).await {
            warn!("Failed to publish to {}: {}", channel, e);
        }
    }
}

/// 操作者校验：空白操作者一律拒绝。
fn validate_actor(actor_id: &str) -> Result<(), SignalError> {
    if actor_id.trim().is_empty() {
        return Err(SignalError::Validation("actor_id must not be empty".into()));
    }
    Ok(())
}

fn cache_err(e: CacheError) -> SignalError {
    SignalError::Database(e.to_string())
}
