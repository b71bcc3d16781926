use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::fs;
use std::str::FromStr;
use std::time::Duration;
use vega_core::common::ConfirmationSource;
use vega_core::signal::entity::{SignalId, SignalStatus, TradeSignal};
use vega_core::signal::error::SignalError;
use vega_core::signal::port::SignalStore;

/// 信号数据库文件名
const SIGNALS_DB: &str = "signals.db";

/// SignalStore 的 SQLite 实现。
///
/// # Summary
/// 在 `signals.db` 中管理 `trade_signals` 表。终态迁移以单条
/// `UPDATE ... WHERE status = 'pending'` 完成，条件谓词本身就是
/// 并发保护：两个并发的确认请求恰有一个命中受影响行数 1。
///
/// # Invariants
/// * 表结构在存储实例创建时初始化。
/// * 所有操作均通过共享的 `SqlitePool` 执行。
/// * 终态记录永不删除。
pub struct SqliteSignalStore {
    pool: SqlitePool,
}

impl SqliteSignalStore {
    /// 创建新的 SqliteSignalStore 并初始化表结构。
    ///
    /// # Logic
    /// 1. 获取配置的数据根目录并确保其存在。
    /// 2. 配置 SQLite 连接选项，开启 `create_if_missing`。
    /// 3. 连接到数据库并执行 DDL。
    ///
    /// # Returns
    /// * `Result<Self, SignalError>` - 存储实例 or 数据库错误。
    pub async fn new() -> Result<Self, SignalError> {
        let root = crate::config::get_root_dir();
        fs::create_dir_all(&root).map_err(|e| SignalError::Database(e.to_string()))?;

        // WAL + busy_timeout：并发终态迁移在写锁上排队而不是直接报错
        let options = SqliteConnectOptions::new()
            .filename(root.join(SIGNALS_DB))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| SignalError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_signals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                strategy_type TEXT NOT NULL,
                action TEXT NOT NULL,
                option_symbol TEXT NOT NULL,
                strike_price TEXT NOT NULL,
                expiration_date TEXT NOT NULL,
                option_type TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                limit_price TEXT,
                confidence_score REAL,
                reasoning TEXT,
                market_conditions TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                confirmation_source TEXT,
                confirmed_at DATETIME,
                confirmed_by TEXT,
                expires_at DATETIME NOT NULL,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trade_signals_user_status
                ON trade_signals (user_id, status);

            CREATE INDEX IF NOT EXISTS idx_trade_signals_expires_at
                ON trade_signals (expires_at);
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    /// 按 id 读取完整记录。
    async fn fetch(&self, id: &SignalId) -> Result<Option<TradeSignal>, SignalError> {
        let row = sqlx::query("SELECT * FROM trade_signals WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SignalError::Database(e.to_string()))?;

        row.map(|r| row_to_signal(&r)).transpose()
    }

    /// 终态迁移共用路径：条件更新后按影响行数裁决。
    ///
    /// # Logic
    /// 1. 执行 `UPDATE ... WHERE id = ? AND status = 'pending'`。
    /// 2. 影响行数为 1 则回读并返回赢得迁移后的记录。
    /// 3. 影响行数为 0 则回查，区分 `NotFound` 与 `AlreadyProcessed`。
    async fn transition(
        &self,
        id: &SignalId,
        target: SignalStatus,
        actor_id: Option<&str>,
        source: Option<ConfirmationSource>,
    ) -> Result<TradeSignal, SignalError> {
        let result = sqlx::query(
            "UPDATE trade_signals
             SET status = ?, confirmation_source = ?, confirmed_at = ?, confirmed_by = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(target.to_string())
        .bind(source.map(|s| s.to_string()))
        .bind(Utc::now())
        .bind(actor_id)
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.fetch(id).await? {
                Some(_) => Err(SignalError::AlreadyProcessed(id.0.clone())),
                None => Err(SignalError::NotFound(id.0.clone())),
            };
        }

        self.fetch(id)
            .await?
            .ok_or_else(|| SignalError::NotFound(id.0.clone()))
    }
}

#[async_trait]
impl SignalStore for SqliteSignalStore {
    /// # Summary
    /// 插入一条新的 pending 信号。
    async fn insert(&self, signal: &TradeSignal) -> Result<(), SignalError> {
        let market_conditions = signal
            .market_conditions
            .as_ref()
            .map(|v| v.to_string());

        sqlx::query(
            "INSERT INTO trade_signals (
                id, user_id, symbol, strategy_type, action, option_symbol,
                strike_price, expiration_date, option_type, quantity, limit_price,
                confidence_score, reasoning, market_conditions, status,
                confirmation_source, confirmed_at, confirmed_by, expires_at, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&signal.id.0)
        .bind(&signal.user_id)
        .bind(&signal.symbol)
        .bind(&signal.strategy_type)
        .bind(signal.action.to_string())
        .bind(&signal.option_symbol)
        .bind(signal.strike_price.to_string())
        .bind(signal.expiration_date.to_string())
        .bind(signal.option_type.to_string())
        .bind(signal.quantity)
        .bind(signal.limit_price.map(|p| p.to_string()))
        .bind(signal.confidence_score)
        .bind(&signal.reasoning)
        .bind(market_conditions)
        .bind(signal.status.to_string())
        .bind(signal.confirmation_source.map(|s| s.to_string()))
        .bind(signal.confirmed_at)
        .bind(&signal.confirmed_by)
        .bind(signal.expires_at)
        .bind(signal.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;
        Ok(())
    }

    /// # Summary
    /// 按 id 查询信号。
    async fn get(&self, id: &SignalId) -> Result<Option<TradeSignal>, SignalError> {
        self.fetch(id).await
    }

    /// # Summary
    /// 查询用户当前所有 pending 信号，按创建时间倒序。
    async fn pending_for_user(&self, user_id: &str) -> Result<Vec<TradeSignal>, SignalError> {
        let rows = sqlx::query(
            "SELECT * FROM trade_signals
             WHERE user_id = ? AND status = 'pending'
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        rows.iter().map(row_to_signal).collect()
    }

    /// # Summary
    /// 查询用户的信号历史，按创建时间倒序分页。
    async fn history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TradeSignal>, SignalError> {
        let rows = sqlx::query(
            "SELECT * FROM trade_signals
             WHERE user_id = ?
             ORDER BY created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        rows.iter().map(row_to_signal).collect()
    }

    /// # Summary
    /// 确认信号：`pending -> confirmed`，条件更新即并发保护。
    async fn confirm(
        &self,
        id: &SignalId,
        actor_id: &str,
        source: ConfirmationSource,
    ) -> Result<TradeSignal, SignalError> {
        self.transition(id, SignalStatus::Confirmed, Some(actor_id), Some(source))
            .await
    }

    /// # Summary
    /// 拒绝信号：`pending -> rejected`，与 `confirm` 对称。
    async fn reject(
        &self,
        id: &SignalId,
        actor_id: &str,
        source: ConfirmationSource,
    ) -> Result<TradeSignal, SignalError> {
        self.transition(id, SignalStatus::Rejected, Some(actor_id), Some(source))
            .await
    }

    /// # Summary
    /// 过期信号：仅在仍为 pending 时生效，永不覆盖已有决定。
    async fn expire(&self, id: &SignalId) -> Result<TradeSignal, SignalError> {
        self.transition(id, SignalStatus::Expired, None, Some(ConfirmationSource::Auto))
            .await
    }

    /// # Summary
    /// 到期清扫：逐条对到期的 pending 信号执行条件过期。
    ///
    /// # Logic
    /// 1. 查出所有 `expires_at <= now` 且仍 pending 的 id。
    /// 2. 逐条调用 `expire`，每条各自受条件更新保护；
    ///    与确认/拒绝竞争失败的行直接跳过。
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<TradeSignal>, SignalError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM trade_signals WHERE status = 'pending' AND expires_at <= ?",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SignalError::Database(e.to_string()))?;

        let mut expired = Vec::with_capacity(ids.len());
        for id in ids {
            match self.expire(&SignalId(id)).await {
                Ok(signal) => expired.push(signal),
                // 清扫与人工决定竞争失败是正常结果
                Err(SignalError::AlreadyProcessed(_)) | Err(SignalError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if !expired.is_empty() {
            tracing::debug!("{} signal(s) moved to expired", expired.len());
        }
        Ok(expired)
    }
}

/// 将数据库行还原为领域实体。
///
/// # Logic
/// 金额与日期以 TEXT 存储 (SQLite 无原生 DECIMAL/DATE)，
/// 在此处统一解析；任何列级解析失败都视为数据库层错误。
fn row_to_signal(row: &SqliteRow) -> Result<TradeSignal, SignalError> {
    let db_err = |e: String| SignalError::Database(e);

    let strike_price: String = row.try_get("strike_price").map_err(|e| db_err(e.to_string()))?;
    let expiration_date: String = row
        .try_get("expiration_date")
        .map_err(|e| db_err(e.to_string()))?;
    let limit_price: Option<String> =
        row.try_get("limit_price").map_err(|e| db_err(e.to_string()))?;
    let market_conditions: Option<String> = row
        .try_get("market_conditions")
        .map_err(|e| db_err(e.to_string()))?;

    let action: String = row.try_get("action").map_err(|e| db_err(e.to_string()))?;
    let option_type: String = row.try_get("option_type").map_err(|e| db_err(e.to_string()))?;
    let status: String = row.try_get("status").map_err(|e| db_err(e.to_string()))?;
    let confirmation_source: Option<String> = row
        .try_get("confirmation_source")
        .map_err(|e| db_err(e.to_string()))?;

    Ok(TradeSignal {
        id: SignalId(row.try_get("id").map_err(|e| db_err(e.to_string()))?),
        user_id: row.try_get("user_id").map_err(|e| db_err(e.to_string()))?,
        symbol: row.try_get("symbol").map_err(|e| db_err(e.to_string()))?,
        strategy_type: row
            .try_get("strategy_type")
            .map_err(|e| db_err(e.to_string()))?,
        action: action.parse().map_err(db_err)?,
        option_symbol: row
            .try_get("option_symbol")
            .map_err(|e| db_err(e.to_string()))?,
        strike_price: Decimal::from_str(&strike_price).map_err(|e| db_err(e.to_string()))?,
        expiration_date: NaiveDate::from_str(&expiration_date)
            .map_err(|e| db_err(e.to_string()))?,
        option_type: option_type.parse().map_err(db_err)?,
        quantity: row.try_get("quantity").map_err(|e| db_err(e.to_string()))?,
        limit_price: limit_price
            .map(|p| Decimal::from_str(&p).map_err(|e| db_err(e.to_string())))
            .transpose()?,
        confidence_score: row
            .try_get("confidence_score")
            .map_err(|e| db_err(e.to_string()))?,
        reasoning: row.try_get("reasoning").map_err(|e| db_err(e.to_string()))?,
        market_conditions: market_conditions
            .map(|v| serde_json::from_str(&v).map_err(|e| db_err(e.to_string())))
            .transpose()?,
        status: status.parse().map_err(db_err)?,
        confirmation_source: confirmation_source
            .map(|s| s.parse().map_err(db_err))
            .transpose()?,
        confirmed_at: row
            .try_get("confirmed_at")
            .map_err(|e| db_err(e.to_string()))?,
        confirmed_by: row
            .try_get("confirmed_by")
            .map_err(|e| db_err(e.to_string()))?,
        expires_at: row.try_get("expires_at").map_err(|e| db_err(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| db_err(e.to_string()))?,
    })
}
