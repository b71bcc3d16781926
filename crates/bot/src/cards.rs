//! Card and text rendering for the Discord surface. Pure functions so
//! the visual contract is unit-testable without any network.

use crate::api_client::{ConfigRecord, PnlRecord, PositionRecord, SignalRecord};
use chrono::Utc;
use vega_core::bus::entity::PositionUpdateEvent;
use vega_core::chat::entity::{CardField, CardUpdate, SignalCard};

/// Buy signals render green, sell signals red.
const COLOR_BUY: u32 = 0x00FF00;
const COLOR_SELL: u32 = 0xFF0000;
const COLOR_CONFIRMED: u32 = 0x00FF00;
const COLOR_REJECTED: u32 = 0xFF0000;
const COLOR_EXPIRED: u32 = 0x808080;
const COLOR_DETAILS: u32 = 0x0099FF;

fn field(name: &str, value: impl Into<String>, inline: bool) -> CardField {
    CardField {
        name: name.to_string(),
        value: value.into(),
        inline,
    }
}

/// # Summary
/// Renders a pending signal as an interactive card with the three
/// mutually exclusive actions attached.
pub fn signal_card(signal: &SignalRecord) -> SignalCard {
    let time_remaining = (signal.expires_at - Utc::now()).num_seconds().max(0);
    let color = if signal.action == "sell" { COLOR_SELL } else { COLOR_BUY };

    SignalCard {
        signal_id: Some(signal.id.clone()),
        title: format!("🎯 New Trade Signal: {}", signal.symbol),
        description: Some(
            signal
                .reasoning
                .clone()
                .unwrap_or_else(|| "AI-generated trade opportunity".to_string()),
        ),
        color,
        fields: vec![
            field("Strategy", signal.strategy_type.replace('_', " ").to_uppercase(), true),
            field("Action", signal.action.to_uppercase(), true),
            field(
                "Confidence",
                signal
                    .confidence_score
                    .map(|c| format!("{}%", c))
                    .unwrap_or_else(|| "N/A".to_string()),
                true,
            ),
            field("Option", signal.option_symbol.clone(), false),
            field("Strike", format!("${}", signal.strike_price), true),
            field("Expiration", signal.expiration_date.clone(), true),
            field("Type", signal.option_type.to_uppercase(), true),
            field("Quantity", signal.quantity.to_string(), true),
            field(
                "Limit Price",
                signal
                    .limit_price
                    .as_ref()
                    .map(|p| format!("${}", p))
                    .unwrap_or_else(|| "Market".to_string()),
                true,
            ),
            field("⏱️ Time Remaining", format!("{}s", time_remaining), true),
        ],
        footer: Some(format!("Signal ID: {}", signal.id)),
        with_actions: true,
    }
}

/// Terminal visual for a confirmed signal.
pub fn confirmed_update(symbol: &str) -> CardUpdate {
    CardUpdate {
        title: format!("✅ Trade Confirmed: {}", symbol),
        color: COLOR_CONFIRMED,
    }
}

/// Terminal visual for a rejected signal.
pub fn rejected_update(symbol: &str) -> CardUpdate {
    CardUpdate {
        title: format!("❌ Trade Rejected: {}", symbol),
        color: COLOR_REJECTED,
    }
}

/// Terminal visual for an expired signal.
pub fn expired_update(symbol: &str) -> CardUpdate {
    CardUpdate {
        title: format!("⏰ Signal Expired: {}", symbol),
        color: COLOR_EXPIRED,
    }
}

/// Picks the terminal visual matching a stored status, None while pending.
pub fn terminal_update(status: &str, symbol: &str) -> Option<CardUpdate> {
    match status {
        "confirmed" => Some(confirmed_update(symbol)),
        "rejected" => Some(rejected_update(symbol)),
        "expired" => Some(expired_update(symbol)),
        _ => None,
    }
}

/// # Summary
/// Renders the ephemeral details reply for the 📊 button.
pub fn details_card(signal: &SignalRecord) -> SignalCard {
    SignalCard {
        signal_id: None,
        title: format!("📊 Signal Details: {}", signal.symbol),
        description: None,
        color: COLOR_DETAILS,
        fields: vec![
            field(
                "Market Conditions",
                format_market_conditions(signal.market_conditions.as_ref()),
                false,
            ),
            field(
                "AI Reasoning",
                signal.reasoning.clone().unwrap_or_else(|| "N/A".to_string()),
                false,
            ),
        ],
        footer: Some(format!("Signal ID: {}", signal.id)),
        with_actions: false,
    }
}

/// # Summary
/// Renders a position-closed notification card.
pub fn position_closed_card(update: &PositionUpdateEvent) -> SignalCard {
    let realized = update.realized_pnl.unwrap_or(0.0);
    let (color, emoji) = if realized >= 0.0 {
        (COLOR_CONFIRMED, "📈")
    } else {
        (COLOR_REJECTED, "📉")
    };

    let mut fields = Vec::new();
    if let Some(strategy) = &update.strategy_type {
        fields.push(field("Strategy", strategy.replace('_', " ").to_uppercase(), true));
    }
    if let Some(reason) = &update.close_reason {
        fields.push(field("Close Reason", reason.replace('_', " ").to_uppercase(), true));
    }
    if let Some(exit) = update.exit_price {
        fields.push(field("Exit Price", format!("${:.2}", exit), true));
    }
    fields.push(field("Realized P&L", format!("${:.2}", realized), true));
    if let Some(pct) = update.realized_pnl_pct {
        fields.push(field("P&L %", format!("{:.2}%", pct), true));
    }

    SignalCard {
        signal_id: None,
        title: format!("{} Position Closed: {}", emoji, update.symbol),
        description: None,
        color,
        fields,
        footer: None,
        with_actions: false,
    }
}

fn format_market_conditions(conditions: Option<&serde_json::Value>) -> String {
    let Some(conditions) = conditions else {
        return "N/A".to_string();
    };

    let mut parts = Vec::new();
    if let Some(price) = conditions.get("stock_price").and_then(|v| v.as_f64()) {
        parts.push(format!("Stock Price: ${}", price));
    }
    if let Some(hv) = conditions.get("historical_volatility").and_then(|v| v.as_f64()) {
        parts.push(format!("HV: {}%", hv));
    }
    if let Some(sentiment) = conditions.get("news_sentiment").and_then(|v| v.as_f64()) {
        parts.push(format!("Sentiment: {}", sentiment));
    }

    if parts.is_empty() {
        "N/A".to_string()
    } else {
        parts.join("\n")
    }
}

// ============================================================
//  Text command rendering
// ============================================================

/// `!signals` reply.
pub fn render_pending(signals: &[SignalRecord]) -> String {
    if signals.is_empty() {
        return "No pending signals.".to_string();
    }
    let mut out = format!("**Pending signals ({}):**\n", signals.len());
    for s in signals {
        out.push_str(&format!(
            "• `{}` {} {} {} x{} — expires <t:{}:R>\n",
            s.id, s.action.to_uppercase(), s.option_symbol, s.option_type, s.quantity,
            s.expires_at.timestamp(),
        ));
    }
    out
}

/// `!positions` reply.
pub fn render_positions(positions: &[PositionRecord]) -> String {
    if positions.is_empty() {
        return "No open positions.".to_string();
    }
    let mut out = format!("**Open positions ({}):**\n", positions.len());
    for p in positions {
        out.push_str(&format!(
            "• {} x{} @ ${} (mark: {}, uPnL: {})\n",
            p.option_symbol,
            p.quantity,
            p.entry_price,
            p.current_price.as_deref().unwrap_or("—"),
            p.unrealized_pnl.as_deref().unwrap_or("—"),
        ));
    }
    out
}

/// `!pnl` reply.
pub fn render_pnl(pnl: &PnlRecord) -> String {
    let win_rate = pnl
        .win_rate
        .map(|w| format!("{:.1}%", w * 100.0))
        .unwrap_or_else(|| "—".to_string());
    format!(
        "**P&L summary**\nRealized: ${}\nUnrealized: ${}\nOpen: {} | Closed: {} | Win rate: {}",
        pnl.realized_pnl, pnl.unrealized_pnl, pnl.open_positions, pnl.closed_positions, win_rate,
    )
}

/// `!config` reply.
pub fn render_config(config: &ConfigRecord) -> String {
    format!(
        "**Trading configuration**\nMax position size: ${}\nMax daily trades: {}\nMin confidence: {}%\nTrading enabled: {}",
        config.max_position_size,
        config.max_daily_trades,
        config.min_confidence,
        if config.trading_enabled { "yes" } else { "no" },
    )
}

/// `!help` reply.
pub fn render_help(prefix: &str) -> String {
    format!(
        "**Available commands**\n\
         `{p}signals` — show pending trade signals\n\
         `{p}positions` — show open positions\n\
         `{p}pnl` — show profit & loss summary\n\
         `{p}config` — show trading configuration\n\
         `{p}pause` — pause signal generation\n\
         `{p}resume` — resume signal generation\n\
         `{p}help` — show this help message",
        p = prefix,
    )
}
