use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// # Summary
/// 交易方向枚举，描述信号建议的操作。
///
/// # Invariants
/// - 序列化形式固定为小写 (`buy` / `sell`)，作为总线与 REST 的线缆契约。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    // 买入开仓
    Buy,
    // 卖出平仓
    Sell,
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            _ => Err(format!("Unknown TradeAction: {}", s)),
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
        }
    }
}

/// # Summary
/// 期权类型枚举。
///
/// # Invariants
/// - 序列化形式固定为小写 (`call` / `put`)。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    // 看涨期权
    Call,
    // 看跌期权
    Put,
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "call" => Ok(OptionType::Call),
            "put" => Ok(OptionType::Put),
            _ => Err(format!("Unknown OptionType: {}", s)),
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

/// # Summary
/// 确认来源枚举，记录终态迁移由哪个界面发起。
///
/// # Invariants
/// - 序列化形式固定为小写 (`web` / `chat` / `auto`)。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationSource {
    // 网页端确认
    Web,
    // 聊天端 (Discord) 确认
    Chat,
    // 系统自动 (到期清扫)
    Auto,
}

impl FromStr for ConfirmationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "web" => Ok(ConfirmationSource::Web),
            "chat" | "discord" => Ok(ConfirmationSource::Chat),
            "auto" => Ok(ConfirmationSource::Auto),
            _ => Err(format!("Unknown ConfirmationSource: {}", s)),
        }
    }
}

impl std::fmt::Display for ConfirmationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationSource::Web => write!(f, "web"),
            ConfirmationSource::Chat => write!(f, "chat"),
            ConfirmationSource::Auto => write!(f, "auto"),
        }
    }
}
