use crate::common::{ConfirmationSource, OptionType, TradeAction};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// # Summary
/// 交易信号的系统内唯一标识 (UUID v4 文本形式)。
///
/// # Invariants
/// - SignalId 在整个系统中必须全局唯一。
/// - 对外 (REST / 总线 / 聊天按钮) 均以不透明字符串传递。
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignalId(pub String);

impl SignalId {
    /// 生成一个新的随机标识。
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// # Summary
/// 信号生命周期状态。`Pending` 为初始态，其余均为终态。
///
/// # Invariants
/// - 每个信号至多发生一次 `Pending -> 终态` 迁移，由存储层条件更新仲裁。
/// - 进入终态后除审计字段外不可再变更，记录永不删除。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    // 等待人工确认
    Pending,
    // 已确认 (终态)
    Confirmed,
    // 已拒绝 (终态)
    Rejected,
    // 已过期 (终态，时间触发)
    Expired,
}

impl SignalStatus {
    /// 是否为终态。
    pub fn is_terminal(self) -> bool {
        !matches!(self, SignalStatus::Pending)
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalStatus::Pending => write!(f, "pending"),
            SignalStatus::Confirmed => write!(f, "confirmed"),
            SignalStatus::Rejected => write!(f, "rejected"),
            SignalStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for SignalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SignalStatus::Pending),
            "confirmed" => Ok(SignalStatus::Confirmed),
            "rejected" => Ok(SignalStatus::Rejected),
            "expired" => Ok(SignalStatus::Expired),
            _ => Err(format!("Unknown SignalStatus: {}", s)),
        }
    }
}

/// # Summary
/// 交易信号实体：一笔等待人工确认的期权交易建议。
///
/// # Invariants
/// - `confidence_score` 若存在，必须位于 [0, 100]。
/// - `expires_at` 在创建时必须晚于 `created_at`。
/// - 审计字段 (`confirmed_by` / `confirmation_source` / `confirmed_at`)
///   仅由赢得状态迁移的那次操作写入一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    /// 信号唯一标识
    pub id: SignalId,
    /// 归属用户
    pub user_id: String,
    /// 标的代码 (例如: AAPL)
    pub symbol: String,
    /// 生成该信号的策略名称
    pub strategy_type: String,
    /// 建议操作方向
    pub action: TradeAction,
    /// 期权合约代码 (OCC 格式)
    pub option_symbol: String,
    /// 行权价
    pub strike_price: Decimal,
    /// 合约到期日
    pub expiration_date: NaiveDate,
    /// 期权类型
    pub option_type: OptionType,
    /// 建议数量 (张)
    pub quantity: i64,
    /// 限价，None 表示市价
    pub limit_price: Option<Decimal>,
    /// 置信度 (0-100)
    pub confidence_score: Option<f64>,
    /// 生成理由 (自由文本)
    pub reasoning: Option<String>,
    /// 生成时刻的市场快照 (JSON 原样保存)
    pub market_conditions: Option<serde_json::Value>,
    /// 生命周期状态
    pub status: SignalStatus,
    /// 终态迁移来源 (审计)
    pub confirmation_source: Option<ConfirmationSource>,
    /// 终态迁移时间 (审计)
    pub confirmed_at: Option<DateTime<Utc>>,
    /// 终态迁移操作者 (审计)
    pub confirmed_by: Option<String>,
    /// 信号失效时间
    pub expires_at: DateTime<Utc>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 创建信号时的输入载荷，由信号生成方 (外部引擎或测试) 提供。
/// `id` / `status` / 审计字段由服务层生成。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSignal {
    pub user_id: String,
    pub symbol: String,
    pub strategy_type: String,
    pub action: TradeAction,
    pub option_symbol: String,
    pub strike_price: Decimal,
    pub expiration_date: NaiveDate,
    pub option_type: OptionType,
    pub quantity: i64,
    pub limit_price: Option<Decimal>,
    pub confidence_score: Option<f64>,
    pub reasoning: Option<String>,
    pub market_conditions: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
}

/// # Summary
/// 用户实体。鉴权字段随网关的环境栈一并保留，
/// `discord_user_id` 用于聊天身份解析。
///
/// # Invariants
/// - `id` 必须全局唯一。
/// - `discord_user_id` 若存在，必须全局唯一 (一个 Discord 账号只绑定一个用户)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    // 用户唯一标识
    pub id: String,
    // 用户显示名称
    pub name: String,
    // bcrypt 密码哈希
    pub password_hash: String,
    // 绑定的 Discord 用户 ID (可选)
    pub discord_user_id: Option<String>,
    // 注册时间
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 持仓读模型，供命令面板与 REST 查询使用。
/// 本核心不负责持仓的建立与盯市，仅读取。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub user_id: String,
    pub symbol: String,
    pub option_symbol: String,
    pub quantity: i64,
    pub entry_price: Decimal,
    pub current_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    /// "open" 或 "closed"
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// # Summary
/// 盈亏汇总，由持仓表聚合得出。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlSummary {
    pub user_id: String,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub open_positions: i64,
    pub closed_positions: i64,
    /// 已平仓中盈利笔数占比 (0-1)，无平仓记录时为 None
    pub win_rate: Option<f64>,
}

/// # Summary
/// 用户交易配置，信号生成方与确认界面共同读取。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub user_id: String,
    pub max_position_size: Decimal,
    pub max_daily_trades: i64,
    pub min_confidence: f64,
    pub trading_enabled: bool,
}

impl TradingConfig {
    /// 新用户的默认配置。
    pub fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            max_position_size: Decimal::new(5_000, 0),
            max_daily_trades: 5,
            min_confidence: 60.0,
            trading_enabled: true,
        }
    }
}
