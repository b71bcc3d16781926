use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use rust_decimal_macros::dec;
use std::sync::{Arc, LazyLock};
use vega_api::server::{AppState, build_app};
use vega_api::types::{
    DiscordLinkResponse, HealthResponse, LoginRequest, LoginResponse, PnlSummaryResponse,
    SignalActionRequest, SignalActionResponse, SignalResponse, TradingStatusResponse,
    TradingToggleRequest, TradingToggleResponse, UserIdResponse,
};
use vega_api::ws::RoomRegistry;
use vega_bus::InProcessBus;
use vega_cache::MemCache;
use vega_core::common::{OptionType, TradeAction};
use vega_core::config::AppConfig;
use vega_core::signal::entity::{NewSignal, Position, User};
use vega_core::signal::port::{PositionStore, UserStore};
use vega_signal::SignalService;
use vega_store::signal::SqliteSignalStore;
use vega_store::system::SqliteSystemStore;
use tokio::net::TcpListener;

static TEST_ROOT: LazyLock<tempfile::TempDir> =
    LazyLock::new(|| tempfile::tempdir().expect("Failed to create temp dir"));

/// 帮助函数：在随机端口启动测试服务器，预置一个绑定了 Discord 的用户
async fn spawn_test_server() -> (String, Arc<SignalService>, Arc<SqliteSystemStore>) {
    vega_store::config::set_root_dir(TEST_ROOT.path().to_path_buf());

    let signal_store = Arc::new(SqliteSignalStore::new().await.unwrap());
    let system_store = Arc::new(SqliteSystemStore::new().await.unwrap());
    let bus = Arc::new(InProcessBus::new(64));
    let cache = Arc::new(MemCache::new());
    let signal_service = SignalService::new(signal_store, bus, cache);

    // 预置测试用户 (密码 "trader_password"，已绑定 Discord)
    let hashed = bcrypt::hash("trader_password", bcrypt::DEFAULT_COST).unwrap();
    let user = User {
        id: "trader_01".to_string(),
        name: "Trader One".to_string(),
        password_hash: hashed,
        discord_user_id: Some("discord_777".to_string()),
        created_at: Utc::now(),
    };
    system_store.save_user(&user).await.unwrap();

    let state = AppState {
        signal_service: signal_service.clone(),
        user_store: system_store.clone(),
        position_store: system_store.clone(),
        config_store: system_store.clone(),
        rooms: Arc::new(RoomRegistry::new()),
        app_config: Arc::new(AppConfig::default()),
        started_at: std::time::Instant::now(),
    };

    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let addr = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // 稍微等待服务器启动
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    (addr, signal_service, system_store)
}

fn sample_input(user_id: &str, ttl_secs: i64) -> NewSignal {
    NewSignal {
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
        reasoning: Some("Breakout above resistance".to_string()),
        market_conditions: None,
        expires_at: Utc::now() + ChronoDuration::seconds(ttl_secs),
    }
}

#[tokio::test]
async fn test_full_api_workflow() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    let (base_url, signal_service, system_store) = spawn_test_server().await;
    let client = reqwest::Client::new();

    // ============================================
    // Case 1: 健康检查 (公开路由)
    // ============================================
    let res = client.get(format!("{}/health", base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let health: HealthResponse = res.json().await.unwrap();
    assert_eq!(health.status, "ok");

    // ============================================
    // Case 2: 未携带 Token 访问业务路由被拒绝
    // ============================================
    let res = client
        .get(format!("{}/api/v1/signals/pending", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // ============================================
    // Case 3: 登录失败与成功
    // ============================================
    let res = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&LoginRequest {
            username: "trader_01".to_string(),
            password: "wrongpassword".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&LoginRequest {
            username: "trader_01".to_string(),
            password: "trader_password".to_string(),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let login: LoginResponse = res.json().await.unwrap();
    let token = login.token;

    // ============================================
    // Case 4: 信号端到端 —— 确认赢、拒绝输、过期不覆盖
    // ============================================
    let created = signal_service
        .create(sample_input("trader_01", 5))
        .await
        .unwrap();

    let res = client
        .get(format!("{}/api/v1/signals/pending", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let pending: Vec<SignalResponse> = res.json().await.unwrap();
    assert!(pending.iter().any(|s| s.id == created.id.0));

    // 确认成功
    let res = client
        .post(format!("{}/api/v1/signals/{}/confirm", base_url, created.id))
        .bearer_auth(&token)
        .json(&SignalActionRequest {
            source: Some("web".to_string()),
            user_id: None,
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let action: SignalActionResponse = res.json().await.unwrap();
    assert!(action.success);
    assert_eq!(action.signal.unwrap().status, "confirmed");

    // 紧随其后的拒绝是竞争失败方：409 + success:false
    let res = client
        .post(format!("{}/api/v1/signals/{}/reject", base_url, created.id))
        .bearer_auth(&token)
        .json(&SignalActionRequest { source: None, user_id: None })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let action: SignalActionResponse = res.json().await.unwrap();
    assert!(!action.success);

    // 越过失效时间后清扫，已确认的信号保持 confirmed
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    signal_service.sweep_expired(Utc::now()).await.unwrap();

    let res = client
        .get(format!("{}/api/v1/signals/{}", base_url, created.id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stored: SignalResponse = res.json().await.unwrap();
    assert_eq!(stored.status, "confirmed");

    // ============================================
    // Case 5: 过期路径 —— 无人操作的信号被清扫为 expired
    // ============================================
    let idle = signal_service
        .create(sample_input("trader_01", 1))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    signal_service.sweep_expired(Utc::now()).await.unwrap();

    let res = client
        .get(format!("{}/api/v1/signals/{}", base_url, idle.id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let stored: SignalResponse = res.json().await.unwrap();
    assert_eq!(stored.status, "expired");

    // 过期后的确认同样收到 409
    let res = client
        .post(format!("{}/api/v1/signals/{}/confirm", base_url, idle.id))
        .bearer_auth(&token)
        .json(&SignalActionRequest { source: None, user_id: None })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // 不存在的信号是 404
    let res = client
        .get(format!("{}/api/v1/signals/does-not-exist", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // ============================================
    // Case 6: Discord 身份映射双向查询
    // ============================================
    let res = client
        .get(format!("{}/api/v1/users/trader_01/discord", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let link: DiscordLinkResponse = res.json().await.unwrap();
    assert_eq!(link.discord_user_id.as_deref(), Some("discord_777"));

    let res = client
        .get(format!("{}/api/v1/users/by-discord/discord_777", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let owner: UserIdResponse = res.json().await.unwrap();
    assert_eq!(owner.user_id, "trader_01");

    let res = client
        .get(format!("{}/api/v1/users/by-discord/unknown", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // ============================================
    // Case 7: 交易控制 pause / resume / status
    // ============================================
    let res = client
        .post(format!("{}/api/v1/trading/pause", base_url))
        .bearer_auth(&token)
        .json(&TradingToggleRequest { user_id: None })
        .send()
        .await
        .unwrap();
    let toggled: TradingToggleResponse = res.json().await.unwrap();
    assert!(toggled.success);

    let res = client
        .get(format!("{}/api/v1/trading/status", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let status: TradingStatusResponse = res.json().await.unwrap();
    assert!(status.is_paused);

    client
        .post(format!("{}/api/v1/trading/resume", base_url))
        .bearer_auth(&token)
        .json(&TradingToggleRequest { user_id: None })
        .send()
        .await
        .unwrap();
    let res = client
        .get(format!("{}/api/v1/trading/status", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let status: TradingStatusResponse = res.json().await.unwrap();
    assert!(!status.is_paused);

    // ============================================
    // Case 8: 持仓与盈亏读路径
    // ============================================
    let now = Utc::now();
    system_store
        .upsert_position(&Position {
            user_id: "trader_01".to_string(),
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
        })
        .await
        .unwrap();

    let res = client
        .get(format!("{}/api/v1/positions", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let positions: Vec<vega_api::types::PositionResponse> = res.json().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol, "NVDA");

    let res = client
        .get(format!("{}/api/v1/analytics/pnl", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let pnl: PnlSummaryResponse = res.json().await.unwrap();
    assert_eq!(pnl.open_positions, 1);
}

#[tokio::test]
async fn test_service_token_acts_for_target_user() {
    let (base_url, signal_service, _store) = spawn_test_server().await;
    let client = reqwest::Client::new();

    // 服务主体 (聊天桥) 持长效 Token，目标用户在请求体中
    let service_token = vega_api::middleware::auth::issue_jwt(
        &AppConfig::default().server.jwt_secret,
        "vega-bot",
        vega_api::middleware::auth::ROLE_SERVICE,
        3600,
    )
    .unwrap();

    let created = signal_service
        .create(sample_input("trader_01", 60))
        .await
        .unwrap();

    let res = client
        .post(format!("{}/api/v1/signals/{}/confirm", base_url, created.id))
        .bearer_auth(&service_token)
        .json(&SignalActionRequest {
            source: Some("chat".to_string()),
            user_id: Some("trader_01".to_string()),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let action: SignalActionResponse = res.json().await.unwrap();
    assert!(action.success);

    let signal = action.signal.unwrap();
    assert_eq!(signal.confirmation_source.as_deref(), Some("chat"));
    assert_eq!(signal.confirmed_by.as_deref(), Some("trader_01"));
}
