use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::LazyLock;
use vega_core::signal::entity::{Position, TradingConfig, User};
use vega_core::signal::port::{ConfigStore, PositionStore, UserStore};
use vega_store::config::set_root_dir;
use vega_store::system::SqliteSystemStore;

static TEST_ROOT: LazyLock<tempfile::TempDir> =
    LazyLock::new(|| tempfile::tempdir().expect("Failed to create temp dir"));

fn init_root() {
    set_root_dir(TEST_ROOT.path().to_path_buf());
}

#[tokio::test]
async fn test_users_and_discord_identity() {
    init_root();
    let store = SqliteSystemStore::new().await.expect("Failed to create store");

    let user = User {
        id: "u1".to_string(),
        name: "Tester".to_string(),
        password_hash: "$2b$12$fakehash".to_string(),
        discord_user_id: None,
        created_at: Utc::now(),
    };
    store.save_user(&user).await.unwrap();

    let saved = store.get_user("u1").await.unwrap().expect("User should exist");
    assert_eq!(saved.name, "Tester");
    assert!(saved.discord_user_id.is_none());

    // 绑定 Discord 身份后双向可查
    store.link_discord("u1", "discord_42").await.unwrap();
    assert_eq!(
        store.discord_id_for("u1").await.unwrap().as_deref(),
        Some("discord_42")
    );
    let resolved = store.user_by_discord("discord_42").await.unwrap().unwrap();
    assert_eq!(resolved.id, "u1");

    // 不存在的用户：绑定报 NotFound，查询返回 None
    assert!(store.link_discord("nobody", "x").await.is_err());
    assert!(store.discord_id_for("nobody").await.unwrap().is_none());
    assert!(store.user_by_discord("x").await.unwrap().is_none());
}

#[tokio::test]
async fn test_positions_and_pnl_summary() {
    init_root();
    let store = SqliteSystemStore::new().await.expect("Failed to create store");

    let now = Utc::now();
    let open = Position {
        user_id: "u2".to_string(),
        symbol: "NVDA".to_string(),
        option_symbol: "NVDA260117C00150000".to_string(),
        quantity: 3,
        entry_price: dec!(6.40),
        current_price: Some(dec!(7.10)),
        unrealized_pnl: Some(dec!(210.00)),
        realized_pnl: None,
        status: "open".to_string(),
        opened_at: now,
        closed_at: None,
    };
    let won = Position {
        option_symbol: "NVDA251219P00120000".to_string(),
        status: "closed".to_string(),
        unrealized_pnl: None,
        realized_pnl: Some(dec!(380.50)),
        closed_at: Some(now),
        ..open.clone()
    };
    let lost = Position {
        option_symbol: "NVDA251219C00180000".to_string(),
        status: "closed".to_string(),
        unrealized_pnl: None,
        realized_pnl: Some(dec!(-120.00)),
        closed_at: Some(now),
        ..open.clone()
    };
    store.upsert_position(&open).await.unwrap();
    store.upsert_position(&won).await.unwrap();
    store.upsert_position(&lost).await.unwrap();

    let positions = store.open_positions("u2").await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].option_symbol, "NVDA260117C00150000");

    let summary = store.pnl_summary("u2").await.unwrap();
    assert_eq!(summary.open_positions, 1);
    assert_eq!(summary.closed_positions, 2);
    assert_eq!(summary.realized_pnl, dec!(260.50));
    assert_eq!(summary.unrealized_pnl, dec!(210.00));
    assert_eq!(summary.win_rate, Some(0.5));
}

#[tokio::test]
async fn test_trading_config_defaults_and_persistence() {
    init_root();
    let store = SqliteSystemStore::new().await.expect("Failed to create store");

    // 未配置时返回默认值
    let config = store.trading_config("u3").await.unwrap();
    assert!(config.trading_enabled);
    assert_eq!(config.max_daily_trades, 5);

    let custom = TradingConfig {
        user_id: "u3".to_string(),
        max_position_size: dec!(2500),
        max_daily_trades: 3,
        min_confidence: 75.0,
        trading_enabled: false,
    };
    store.save_trading_config(&custom).await.unwrap();

    let loaded = store.trading_config("u3").await.unwrap();
    assert_eq!(loaded.max_position_size, dec!(2500));
    assert_eq!(loaded.max_daily_trades, 3);
    assert!(!loaded.trading_enabled);
}
