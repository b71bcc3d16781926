use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::fs;
use std::str::FromStr;
use vega_core::signal::entity::{PnlSummary, Position, TradingConfig, User};
use vega_core::signal::error::SignalError;
use vega_core::signal::port::{ConfigStore, PositionStore, UserStore};

/// 系统数据库文件名
const SYSTEM_DB: &str = "app.db";

/// UserStore / PositionStore / ConfigStore 的 SQLite 实现。
///
/// # Summary
/// 在中心化的 `app.db` 中管理用户档案、Discord 身份映射、
/// 持仓读模型与用户交易配置。
///
/// # Invariants
/// * 数据库结构在存储实例创建时初始化。
/// * 所有操作均通过共享的 `SqlitePool` 执行。
pub struct SqliteSystemStore {
    pool: SqlitePool,
}

impl SqliteSystemStore {
    /// 创建新的 SqliteSystemStore 并初始化全局表结构。
    ///
    /// # Logic
    /// 1. 获取配置的数据根目录并确保其存在。
    /// 2. 配置 SQLite 连接选项，开启 `create_if_missing`。
    /// 3. 连接到数据库并执行 DDL 初始化系统表结构。
    ///
    /// # Returns
    /// * `Result<Self, SignalError>` - 存储实例 or 数据库错误。
    pub async fn new() -> Result<Self, SignalError> {
        let root = crate::config::get_root_dir();
        fs::create_dir_all(&root).map_err(|e| SignalError::Database(e.to_string()))?;

        let options = SqliteConnectOptions::new()
            .filename(root.join(SYSTEM_DB))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| SignalError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                discord_user_id TEXT UNIQUE,
                created_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS positions (
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                option_symbol TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                entry_price TEXT NOT NULL,
                current_price TEXT,
                unrealized_pnl TEXT,
                realized_pnl TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                opened_at DATETIME NOT NULL,
                closed_at DATETIME,
                PRIMARY KEY (user_id, option_symbol)
            );

            CREATE TABLE IF NOT EXISTS user_configs (
                user_id TEXT PRIMARY KEY,
                max_position_size TEXT NOT NULL,
                max_daily_trades INTEGER NOT NULL,
                min_confidence REAL NOT NULL,
                trading_enabled INTEGER NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl UserStore for SqliteSystemStore {
    /// # Summary
    /// 根据 ID 获取用户信息。
    async fn get_user(&self, id: &str) -> Result<Option<User>, SignalError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SignalError::Database(e.to_string()))?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    /// # Summary
    /// 保存或更新用户信息。
    ///
    /// # Logic
    /// 在 `users` 表上执行 `INSERT OR REPLACE`。
    async fn save_user(&self, user: &User) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT OR REPLACE INTO users (id, name, password_hash, discord_user_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.discord_user_id)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 查询用户绑定的 Discord ID。
    async fn discord_id_for(&self, user_id: &str) -> Result<Option<String>, SignalError> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT discord_user_id FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))
        .map(|r| r.flatten())
    }

    /// # Summary
    /// 按 Discord ID 反查用户。
    async fn user_by_discord(
        &self,
        discord_user_id: &str,
    ) -> Result<Option<User>, SignalError> {
        let row = sqlx::query("SELECT * FROM users WHERE discord_user_id = ?")
            .bind(discord_user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SignalError::Database(e.to_string()))?;

        row.map(|r| row_to_user(&r)).transpose()
    }

    /// # Summary
    /// 绑定用户与 Discord 账号。用户不存在时返回 `NotFound`。
    async fn link_discord(
        &self,
        user_id: &str,
        discord_user_id: &str,
    ) -> Result<(), SignalError> {
        let result = sqlx::query("UPDATE users SET discord_user_id = ? WHERE id = ?")
            .bind(discord_user_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| SignalError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SignalError::NotFound(user_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PositionStore for SqliteSystemStore {
    /// # Summary
    /// 查询用户当前未平仓持仓。
    async fn open_positions(&self, user_id: &str) -> Result<Vec<Position>, SignalError> {
        let rows = sqlx::query(
            "SELECT * FROM positions WHERE user_id = ? AND status = 'open'
             ORDER BY opened_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        rows.iter().map(row_to_position).collect()
    }

    /// # Summary
    /// 聚合用户盈亏汇总。
    ///
    /// # Logic
    /// 单条 SQL 聚合：已平仓的 realized_pnl 求和、未平仓的
    /// unrealized_pnl 求和、开/平仓计数与盈利笔数。
    #[allow(clippy::cast_precision_loss)]
    async fn pnl_summary(&self, user_id: &str) -> Result<PnlSummary, SignalError> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'closed'
                    THEN CAST(realized_pnl AS REAL) ELSE 0 END), 0.0) AS realized,
                COALESCE(SUM(CASE WHEN status = 'open'
                    THEN CAST(unrealized_pnl AS REAL) ELSE 0 END), 0.0) AS unrealized,
                COALESCE(SUM(CASE WHEN status = 'open' THEN 1 ELSE 0 END), 0) AS open_count,
                COALESCE(SUM(CASE WHEN status = 'closed' THEN 1 ELSE 0 END), 0) AS closed_count,
                COALESCE(SUM(CASE WHEN status = 'closed'
                    AND CAST(realized_pnl AS REAL) > 0 THEN 1 ELSE 0 END), 0) AS win_count
            FROM positions WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        let realized: f64 = row
            .try_get("realized")
            .map_err(|e| SignalError::Database(e.to_string()))?;
        let unrealized: f64 = row
            .try_get("unrealized")
            .map_err(|e| SignalError::Database(e.to_string()))?;
        let open_count: i64 = row
            .try_get("open_count")
            .map_err(|e| SignalError::Database(e.to_string()))?;
        let closed_count: i64 = row
            .try_get("closed_count")
            .map_err(|e| SignalError::Database(e.to_string()))?;
        let win_count: i64 = row
            .try_get("win_count")
            .map_err(|e| SignalError::Database(e.to_string()))?;

        let win_rate = if closed_count > 0 {
            Some(win_count as f64 / closed_count as f64)
        } else {
            None
        };

        Ok(PnlSummary {
            user_id: user_id.to_string(),
            realized_pnl: Decimal::from_f64_retain(realized).unwrap_or(Decimal::ZERO),
            unrealized_pnl: Decimal::from_f64_retain(unrealized).unwrap_or(Decimal::ZERO),
            open_positions: open_count,
            closed_positions: closed_count,
            win_rate,
        })
    }

    /// # Summary
    /// 写入或更新一条持仓。
    ///
    /// # Logic
    /// 执行 `INSERT OR REPLACE` 写入 `positions` 表。
    async fn upsert_position(&self, position: &Position) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT OR REPLACE INTO positions (
                user_id, symbol, option_symbol, quantity, entry_price, current_price,
                unrealized_pnl, realized_pnl, status, opened_at, closed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&position.user_id)
        .bind(&position.symbol)
        .bind(&position.option_symbol)
        .bind(position.quantity)
        .bind(position.entry_price.to_string())
        .bind(position.current_price.map(|p| p.to_string()))
        .bind(position.unrealized_pnl.map(|p| p.to_string()))
        .bind(position.realized_pnl.map(|p| p.to_string()))
        .bind(&position.status)
        .bind(position.opened_at)
        .bind(position.closed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for SqliteSystemStore {
    /// # Summary
    /// 查询用户配置，不存在时返回默认配置。
    async fn trading_config(&self, user_id: &str) -> Result<TradingConfig, SignalError> {
        let row = sqlx::query("SELECT * FROM user_configs WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SignalError::Database(e.to_string()))?;

        match row {
            Some(r) => row_to_config(&r),
            None => Ok(TradingConfig::default_for(user_id)),
        }
    }

    /// # Summary
    /// 保存用户配置。
    ///
    /// # Logic
    /// 执行 `INSERT OR REPLACE` 写入 `user_configs` 表。
    async fn save_trading_config(&self, config: &TradingConfig) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT OR REPLACE INTO user_configs (
                user_id, max_position_size, max_daily_trades, min_confidence, trading_enabled
             ) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&config.user_id)
        .bind(config.max_position_size.to_string())
        .bind(config.max_daily_trades)
        .bind(config.min_confidence)
        .bind(config.trading_enabled)
        .execute(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;
        Ok(())
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, SignalError> {
    let db_err = |e: sqlx::Error| SignalError::Database(e.to_string());

    Ok(User {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        password_hash: row.try_get("password_hash").map_err(db_err)?,
        discord_user_id: row.try_get("discord_user_id").map_err(db_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
    })
}

fn row_to_position(row: &SqliteRow) -> Result<Position, SignalError> {
    let db_err = |e: sqlx::Error| SignalError::Database(e.to_string());
    let parse = |s: String| {
        Decimal::from_str(&s).map_err(|e| SignalError::Database(e.to_string()))
    };

    let entry_price: String = row.try_get("entry_price").map_err(db_err)?;
    let current_price: Option<String> = row.try_get("current_price").map_err(db_err)?;
    let unrealized_pnl: Option<String> = row.try_get("unrealized_pnl").map_err(db_err)?;
    let realized_pnl: Option<String> = row.try_get("realized_pnl").map_err(db_err)?;

    Ok(Position {
        user_id: row.try_get("user_id").map_err(db_err)?,
        symbol: row.try_get("symbol").map_err(db_err)?,
        option_symbol: row.try_get("option_symbol").map_err(db_err)?,
        quantity: row.try_get("quantity").map_err(db_err)?,
        entry_price: parse(entry_price)?,
        current_price: current_price.map(parse).transpose()?,
        unrealized_pnl: unrealized_pnl.map(parse).transpose()?,
        realized_pnl: realized_pnl.map(parse).transpose()?,
        status: row.try_get("status").map_err(db_err)?,
        opened_at: row.try_get("opened_at").map_err(db_err)?,
        closed_at: row.try_get("closed_at").map_err(db_err)?,
    })
}

fn row_to_config(row: &SqliteRow) -> Result<TradingConfig, SignalError> {
    let db_err = |e: sqlx::Error| SignalError::Database(e.to_string());

    let max_position_size: String = row.try_get("max_position_size").map_err(db_err)?;

    Ok(TradingConfig {
        user_id: row.try_get("user_id").map_err(db_err)?,
        max_position_size: Decimal::from_str(&max_position_size)
            .map_err(|e| SignalError::Database(e.to_string()))?,
        max_daily_trades: row.try_get("max_daily_trades").map_err(db_err)?,
        min_confidence: row.try_get("min_confidence").map_err(db_err)?,
        trading_enabled: row.try_get("trading_enabled").map_err(db_err)?,
    })
}
