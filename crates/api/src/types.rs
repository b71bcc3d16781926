//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向调用方 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。
//! 信号相关响应的字段形状是 Discord 桥与浏览器前端共同依赖的
//! 线缆契约，不可随意更名。

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vega_core::signal::entity::{PnlSummary, Position, TradeSignal, TradingConfig};

// ============================================================
//  信号相关 DTO
// ============================================================

/// 交易信号 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignalResponse {
    /// 信号 ID
    #[schema(example = "1f0d6d22-8b1a-4f0e-b2d3-9c41c6a7d9aa")]
    pub id: String,
    /// 归属用户 ID
    #[schema(example = "u_1001")]
    pub user_id: String,
    /// 标的代码
    #[schema(example = "AAPL")]
    pub symbol: String,
    /// 策略名称
    #[schema(example = "momentum_breakout")]
    pub strategy_type: String,
    /// 操作方向 (buy/sell)
    #[schema(example = "buy")]
    pub action: String,
    /// 期权合约代码
    #[schema(example = "AAPL260320C00200000")]
    pub option_symbol: String,
    /// 行权价
    #[schema(example = "200.00")]
    pub strike_price: String,
    /// 合约到期日
    #[schema(example = "2026-03-20")]
    pub expiration_date: String,
    /// 期权类型 (call/put)
    #[schema(example = "call")]
    pub option_type: String,
    /// 数量 (张)
    #[schema(example = 2)]
    pub quantity: i64,
    /// 限价 (市价单为 null)
    #[schema(example = "4.35")]
    pub limit_price: Option<String>,
    /// 置信度 (0-100)
    #[schema(example = 82.5)]
    pub confidence_score: Option<f64>,
    /// 生成理由
    pub reasoning: Option<String>,
    /// 生成时刻的市场快照
    #[schema(value_type = Object)]
    pub market_conditions: Option<serde_json::Value>,
    /// 状态 (pending/confirmed/rejected/expired)
    #[schema(example = "pending")]
    pub status: String,
    /// 终态迁移来源 (web/chat/auto)
    pub confirmation_source: Option<String>,
    /// 终态迁移时间 (ISO 8601)
    pub confirmed_at: Option<String>,
    /// 终态迁移操作者
    pub confirmed_by: Option<String>,
    /// 失效时间 (ISO 8601)
    #[schema(example = "2026-03-01T10:05:00Z")]
    pub expires_at: String,
    /// 创建时间 (ISO 8601)
    #[schema(example = "2026-03-01T10:00:00Z")]
    pub created_at: String,
}

/// 确认/拒绝请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignalActionRequest {
    /// 操作来源界面 ("web" / "chat")，缺省为 "web"
    #[schema(example = "chat")]
    pub source: Option<String>,
    /// 被代理操作的用户 (聊天桥代用户操作时携带)；缺省取 JWT 主体
    #[schema(example = "u_1001")]
    pub user_id: Option<String>,
}

/// 确认/拒绝响应体 `{success, signal}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignalActionResponse {
    /// 是否赢得状态迁移
    pub success: bool,
    /// 迁移后的完整记录 (成功时)
    pub signal: Option<SignalResponse>,
    /// 失败原因 (竞争失败时为 "no longer available" 文案)
    pub error: Option<String>,
}

// ============================================================
//  持仓与分析 DTO
// ============================================================

/// 持仓明细 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PositionResponse {
    /// 标的代码
    #[schema(example = "NVDA")]
    pub symbol: String,
    /// 期权合约代码
    #[schema(example = "NVDA260117C00150000")]
    pub option_symbol: String,
    /// 持仓数量 (张)
    #[schema(example = 3)]
    pub quantity: i64,
    /// 开仓均价
    #[schema(example = "6.40")]
    pub entry_price: String,
    /// 最新标记价
    #[schema(example = "7.10")]
    pub current_price: Option<String>,
    /// 浮动盈亏
    #[schema(example = "210.00")]
    pub unrealized_pnl: Option<String>,
    /// 状态 (open/closed)
    #[schema(example = "open")]
    pub status: String,
    /// 开仓时间 (ISO 8601)
    pub opened_at: String,
}

/// 盈亏汇总 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PnlSummaryResponse {
    pub user_id: String,
    /// 已实现盈亏
    #[schema(example = "260.50")]
    pub realized_pnl: String,
    /// 浮动盈亏
    #[schema(example = "210.00")]
    pub unrealized_pnl: String,
    /// 未平仓笔数
    pub open_positions: i64,
    /// 已平仓笔数
    pub closed_positions: i64,
    /// 胜率 (0-1)
    pub win_rate: Option<f64>,
}

/// 用户交易配置 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradingConfigResponse {
    pub user_id: String,
    #[schema(example = "5000")]
    pub max_position_size: String,
    pub max_daily_trades: i64,
    pub min_confidence: f64,
    pub trading_enabled: bool,
}

// ============================================================
//  用户与身份 DTO
// ============================================================

/// Discord 身份查询响应 `{discord_user_id}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscordLinkResponse {
    /// 绑定的 Discord 用户 ID，未绑定时为 null
    pub discord_user_id: Option<String>,
}

/// Discord 反查响应 `{user_id}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserIdResponse {
    pub user_id: String,
}

/// 绑定 Discord 请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkDiscordRequest {
    pub user_id: String,
    pub discord_user_id: String,
}

// ============================================================
//  交易控制 DTO
// ============================================================

/// 暂停/恢复请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradingToggleRequest {
    /// 目标用户；缺省取 JWT 主体
    pub user_id: Option<String>,
}

/// 暂停/恢复响应体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradingToggleResponse {
    pub success: bool,
    #[schema(example = "Trading paused")]
    pub message: String,
}

/// 交易状态响应体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradingStatusResponse {
    pub user_id: String,
    pub is_paused: bool,
}

// ============================================================
//  鉴权与系统 DTO
// ============================================================

/// 登录请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// 用户名
    #[schema(example = "trader_01")]
    pub username: String,
    /// 密码
    #[schema(example = "password123")]
    pub password: String,
}

/// 登录成功返回的 Token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// JWT Bearer Token
    #[schema(example = "eyJhbGciOiJIUzI1NiIs...")]
    pub token: String,
    /// Token 过期时间 (秒)
    #[schema(example = 604800)]
    pub expires_in: u64,
}

/// JWT Claims 内容 (内部使用，不暴露到 Swagger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 主体 (用户 ID 或服务名)
    pub sub: String,
    /// 角色 ("user" 或 "service")
    pub role: String,
    /// Token 过期时间 (Unix 时间戳)
    pub exp: usize,
}

/// 健康检查响应 `{status, timestamp, uptime}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// 当前时间 (ISO 8601)
    pub timestamp: String,
    /// 进程运行时长 (秒)
    pub uptime: u64,
}

/// 构建失败响应
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

// ============================================================
//  领域模型 → DTO 惯用转换 (impl From<T>)
// ============================================================

impl From<&TradeSignal> for SignalResponse {
    fn from(s: &TradeSignal) -> Self {
        Self {
            id: s.id.0.clone(),
            user_id: s.user_id.clone(),
            symbol: s.symbol.clone(),
            strategy_type: s.strategy_type.clone(),
            action: s.action.to_string(),
            option_symbol: s.option_symbol.clone(),
            strike_price: s.strike_price.to_string(),
            expiration_date: s.expiration_date.to_string(),
            option_type: s.option_type.to_string(),
            quantity: s.quantity,
            limit_price: s.limit_price.map(|p| p.to_string()),
            confidence_score: s.confidence_score,
            reasoning: s.reasoning.clone(),
            market_conditions: s.market_conditions.clone(),
            status: s.status.to_string(),
            confirmation_source: s.confirmation_source.map(|c| c.to_string()),
            confirmed_at: s.confirmed_at.map(|t| t.to_rfc3339()),
            confirmed_by: s.confirmed_by.clone(),
            expires_at: s.expires_at.to_rfc3339(),
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

impl From<&Position> for PositionResponse {
    fn from(p: &Position) -> Self {
        Self {
            symbol: p.symbol.clone(),
            option_symbol: p.option_symbol.clone(),
            quantity: p.quantity,
            entry_price: p.entry_price.to_string(),
            current_price: p.current_price.map(|v| v.to_string()),
            unrealized_pnl: p.unrealized_pnl.map(|v| v.to_string()),
            status: p.status.clone(),
            opened_at: p.opened_at.to_rfc3339(),
        }
    }
}

impl From<PnlSummary> for PnlSummaryResponse {
    fn from(s: PnlSummary) -> Self {
        Self {
            user_id: s.user_id,
            realized_pnl: s.realized_pnl.to_string(),
            unrealized_pnl: s.unrealized_pnl.to_string(),
            open_positions: s.open_positions,
            closed_positions: s.closed_positions,
            win_rate: s.win_rate,
        }
    }
}

impl From<TradingConfig> for TradingConfigResponse {
    fn from(c: TradingConfig) -> Self {
        Self {
            user_id: c.user_id,
            max_position_size: c.max_position_size.to_string(),
            max_daily_trades: c.max_daily_trades,
            min_confidence: c.min_confidence,
            trading_enabled: c.trading_enabled,
        }
    }
}
