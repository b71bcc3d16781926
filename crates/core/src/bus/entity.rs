use crate::bus::error::BusError;
use crate::signal::entity::TradeSignal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 新信号广播频道 (精确名，线缆契约)
pub const CHANNEL_SIGNALS_ALL: &str = "signals:all";
/// 状态迁移回声频道 (精确名，线缆契约)
pub const CHANNEL_SIGNALS_UPDATED: &str = "signals:updated";
/// 持仓事件订阅模式
pub const PATTERN_POSITIONS: &str = "positions:*";
/// 通知事件订阅模式
pub const PATTERN_NOTIFICATIONS: &str = "notifications:*";

/// 用户专属信号频道名。
pub fn user_signals_channel(user_id: &str) -> String {
    format!("signals:{}", user_id)
}

/// 用户专属持仓频道名。
pub fn user_positions_channel(user_id: &str) -> String {
    format!("positions:{}", user_id)
}

/// 用户专属通知频道名。
pub fn user_notifications_channel(user_id: &str) -> String {
    format!("notifications:{}", user_id)
}

/// # Summary
/// 持仓变动事件。瞬态消息：仅在总线上传递，本核心不落库。
///
/// # Invariants
/// - `kind` 为 `position_update` 时携带浮动盈亏字段；
///   为 `position_closed` 时携带平仓字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdateEvent {
    /// 事件子类型: "position_update" / "position_closed"
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_pnl_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # Summary
/// 通用通知载荷 `{user_id, title, message, type}`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// # Summary
/// 按频道名打标签的总线消息联合体。订阅方在边界处调用 `decode`
/// 将原始 JSON 载荷转换为强类型变体，解码失败即 `BusError::Malformed`，
/// 由订阅循环记录并跳过 (而非解析后碰运气)。
#[derive(Debug, Clone)]
pub enum BusMessage {
    /// `signals:all` / `signals:<uid>` — 新信号全量记录
    Signal(TradeSignal),
    /// `signals:updated` — 状态迁移后的全量记录 (跨界面回声)
    SignalUpdate(TradeSignal),
    /// `positions:*` — 持仓变动
    Position(PositionUpdateEvent),
    /// `notifications:*` — 通用通知
    Notification(Notification),
}

impl BusMessage {
    /// # Summary
    /// 按频道名将 JSON 载荷解码为对应变体。
    ///
    /// # Logic
    /// 1. `signals:updated` 优先于 `signals:` 前缀匹配。
    /// 2. 前缀路由到各自的 serde 解码。
    /// 3. 契约外的频道返回 `UnknownChannel`。
    ///
    /// # Arguments
    /// * `channel`: 消息到达的字面频道名。
    /// * `payload`: UTF-8 JSON 文本。
    ///
    /// # Returns
    /// 强类型消息或 `BusError`。
    pub fn decode(channel: &str, payload: &str) -> Result<Self, BusError> {
        let malformed = |e: serde_json::Error| BusError::Malformed {
            channel: channel.to_string(),
            reason: e.to_string(),
        };

        if channel == CHANNEL_SIGNALS_UPDATED {
            return Ok(BusMessage::SignalUpdate(
                serde_json::from_str(payload).map_err(malformed)?,
            ));
        }
        if channel.starts_with("signals:") {
            return Ok(BusMessage::Signal(
                serde_json::from_str(payload).map_err(malformed)?,
            ));
        }
        if channel.starts_with("positions:") {
            return Ok(BusMessage::Position(
                serde_json::from_str(payload).map_err(malformed)?,
            ));
        }
        if channel.starts_with("notifications:") {
            return Ok(BusMessage::Notification(
                serde_json::from_str(payload).map_err(malformed)?,
            ));
        }
        Err(BusError::UnknownChannel(channel.to_string()))
    }

    /// 消息归属的用户 id，供按用户房间分发使用。
    pub fn user_id(&self) -> &str {
        match self {
            BusMessage::Signal(s) | BusMessage::SignalUpdate(s) => &s.user_id,
            BusMessage::Position(p) => &p.user_id,
            BusMessage::Notification(n) => &n.user_id,
        }
    }
}
