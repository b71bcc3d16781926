use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::{Arc, LazyLock};
use vega_core::common::{ConfirmationSource, OptionType, TradeAction};
use vega_core::signal::entity::{NewSignal, SignalId, SignalStatus, TradeSignal};
use vega_core::signal::error::SignalError;
use vega_core::signal::port::SignalStore;
use vega_store::config::set_root_dir;
use vega_store::signal::SqliteSignalStore;

// 同一测试二进制内的所有用例共享一个根目录 (set_root_dir 只生效一次)，
// TempDir 必须存活到进程结束
static TEST_ROOT: LazyLock<tempfile::TempDir> =
    LazyLock::new(|| tempfile::tempdir().expect("Failed to create temp dir"));

fn init_root() {
    set_root_dir(TEST_ROOT.path().to_path_buf());
}

fn sample_signal(user_id: &str, ttl_secs: i64) -> TradeSignal {
    let now = Utc::now();
    let input = NewSignal {
        user_id: user_id.to_string(),
        symbol: "AAPL".to_string(),
        strategy_type: "momentum_breakout".to_string(),
        action: TradeAction::Buy,
        option_symbol: "AAPL260320C00200000".to_string(),
        strike_price: dec!(200.00),
        expiration_date: "2026-03-20".parse().unwrap(),
        option_type: OptionType::Call,
        quantity: 2,
        limit_price: Some(dec!(4.35)),
        confidence_score: Some(82.5),
        reasoning: Some("Breakout above resistance with rising volume".to_string()),
        market_conditions: Some(serde_json::json!({
            "stock_price": 198.42,
            "historical_volatility": 31.7,
            "news_sentiment": 0.6
        })),
        expires_at: now + Duration::seconds(ttl_secs),
    };
    TradeSignal {
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
    }
}

#[tokio::test]
async fn test_signal_round_trip_and_terminal_guard() {
    init_root();
    let store = SqliteSignalStore::new().await.expect("Failed to create store");

    // 1. 插入并完整读回
    let signal = sample_signal("u_round", 300);
    store.insert(&signal).await.unwrap();

    let loaded = store.get(&signal.id).await.unwrap().expect("Signal should exist");
    assert_eq!(loaded.status, SignalStatus::Pending);
    assert_eq!(loaded.strike_price, dec!(200.00));
    assert_eq!(loaded.option_type, OptionType::Call);
    assert_eq!(loaded.limit_price, Some(dec!(4.35)));
    assert!(loaded.market_conditions.is_some());

    let pending = store.pending_for_user("u_round").await.unwrap();
    assert_eq!(pending.len(), 1);

    // 2. 确认成功，审计字段落盘
    let confirmed = store
        .confirm(&signal.id, "u_round", ConfirmationSource::Web)
        .await
        .unwrap();
    assert_eq!(confirmed.status, SignalStatus::Confirmed);
    assert_eq!(confirmed.confirmation_source, Some(ConfirmationSource::Web));
    assert_eq!(confirmed.confirmed_by.as_deref(), Some("u_round"));
    assert!(confirmed.confirmed_at.is_some());

    // 3. 紧随其后的拒绝是竞争失败方
    let err = store
        .reject(&signal.id, "u_round", ConfirmationSource::Chat)
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::AlreadyProcessed(_)));

    // 4. 过期也不能覆盖已有决定
    let err = store.expire(&signal.id).await.unwrap_err();
    assert!(matches!(err, SignalError::AlreadyProcessed(_)));
    let final_state = store.get(&signal.id).await.unwrap().unwrap();
    assert_eq!(final_state.status, SignalStatus::Confirmed);

    // 5. 终态记录仍在历史中可查
    let history = store.history("u_round", 10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    let pending = store.pending_for_user("u_round").await.unwrap();
    assert!(pending.is_empty());

    // 6. 不存在的 id 报 NotFound
    let err = store
        .confirm(&SignalId::generate(), "u_round", ConfirmationSource::Web)
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_transitions_exactly_one_winner() {
    init_root();
    let store = Arc::new(SqliteSignalStore::new().await.expect("Failed to create store"));

    let signal = sample_signal("u_race", 300);
    store.insert(&signal).await.unwrap();

    // 8 个并发终态迁移：一半确认、一半拒绝
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let id = signal.id.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                store.confirm(&id, "u_race", ConfirmationSource::Web).await
            } else {
                store.reject(&id, "u_race", ConfirmationSource::Chat).await
            }
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(signal) => winners.push(signal),
            Err(SignalError::AlreadyProcessed(_)) => losers += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }

    // 恰有一个赢家，其余全部收到 AlreadyProcessed
    assert_eq!(winners.len(), 1);
    assert_eq!(losers, 7);

    // 最终落库状态与赢家一致，且永不回到 pending
    let stored = store.get(&signal.id).await.unwrap().unwrap();
    assert!(stored.status.is_terminal());
    assert_eq!(stored.status, winners[0].status);
}

#[tokio::test]
async fn test_expire_due_sweeps_only_due_pending() {
    init_root();
    let store = SqliteSignalStore::new().await.expect("Failed to create store");

    // 已到期 / 未到期 / 已到期但已被确认，三种情况各一条
    let due = sample_signal("u_sweep", -5);
    let fresh = sample_signal("u_sweep", 600);
    let decided = sample_signal("u_sweep", -5);
    store.insert(&due).await.unwrap();
    store.insert(&fresh).await.unwrap();
    store.insert(&decided).await.unwrap();
    store
        .confirm(&decided.id, "u_sweep", ConfirmationSource::Web)
        .await
        .unwrap();

    let expired = store.expire_due(Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, due.id);
    assert_eq!(expired[0].status, SignalStatus::Expired);

    // 未到期的保持 pending，已确认的保持 confirmed
    assert_eq!(
        store.get(&fresh.id).await.unwrap().unwrap().status,
        SignalStatus::Pending
    );
    assert_eq!(
        store.get(&decided.id).await.unwrap().unwrap().status,
        SignalStatus::Confirmed
    );

    // 再次清扫无新结果
    let expired = store.expire_due(Utc::now()).await.unwrap();
    assert!(expired.is_empty());
}
