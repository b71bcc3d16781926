use chrono::{Duration as ChronoDuration, Utc};
use futures::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use vega_api::server::{AppState, build_app};
use vega_api::ws::{RoomRegistry, fanout::spawn_fanout};
use vega_bus::InProcessBus;
use vega_cache::MemCache;
use vega_core::bus::port::EventBus;
use vega_core::common::{OptionType, TradeAction};
use vega_core::config::AppConfig;
use vega_core::signal::entity::NewSignal;
use vega_signal::SignalService;
use vega_store::signal::SqliteSignalStore;

static TEST_ROOT: LazyLock<tempfile::TempDir> =
    LazyLock::new(|| tempfile::tempdir().expect("Failed to create temp dir"));

/// 启动带扇出协程的测试服务器，返回 ws 地址与信号服务
async fn spawn_ws_server() -> (String, Arc<SignalService>, Arc<InProcessBus>) {
    vega_store::config::set_root_dir(TEST_ROOT.path().to_path_buf());

    let signal_store = Arc::new(SqliteSignalStore::new().await.unwrap());
    let bus = Arc::new(InProcessBus::new(64));
    let cache = Arc::new(MemCache::new());
    let signal_service = SignalService::new(signal_store, bus.clone(), cache);

    let rooms = Arc::new(RoomRegistry::new());
    let bus_dyn: Arc<dyn EventBus> = bus.clone();
    let _handles = spawn_fanout(&bus_dyn, rooms.clone());

    let system_store = Arc::new(vega_store::system::SqliteSystemStore::new().await.unwrap());
    let state = AppState {
        signal_service: signal_service.clone(),
        user_store: system_store.clone(),
        position_store: system_store.clone(),
        config_store: system_store,
        rooms,
        app_config: Arc::new(AppConfig::default()),
        started_at: std::time::Instant::now(),
    };

    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    (format!("ws://127.0.0.1:{}/ws", port), signal_service, bus)
}

fn sample_input(user_id: &str) -> NewSignal {
    NewSignal {
        user_id: user_id.to_string(),
        symbol: "MSFT".to_string(),
        strategy_type: "earnings_play".to_string(),
        action: TradeAction::Buy,
        option_symbol: "MSFT260220C00450000".to_string(),
        strike_price: dec!(450.00),
        expiration_date: "2026-02-20".parse().unwrap(),
        option_type: OptionType::Call,
        quantity: 1,
        limit_price: None,
        confidence_score: Some(64.0),
        reasoning: None,
        market_conditions: None,
        expires_at: Utc::now() + ChronoDuration::seconds(120),
    }
}

/// 带超时读取下一条文本帧并解析为 JSON
async fn next_json(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
    millis: u64,
) -> Option<serde_json::Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_millis(millis), ws.next())
            .await
            .ok()??
            .ok()?;
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).ok(),
            // 底层控制帧跳过
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_ws_authenticate_ping_and_push() {
    let (ws_url, signal_service, _bus) = spawn_ws_server().await;

    let (mut ws, _) = connect_async(&ws_url).await.expect("WS connect failed");

    // 入房之前发布的事件永远收不到 (晚加入即错过)
    signal_service.create(sample_input("ws_user")).await.unwrap();

    // ping 在认证前也可用
    ws.send(Message::Text(r#"{"type":"ping"}"#.into())).await.unwrap();
    let pong = next_json(&mut ws, 1000).await.expect("Expected pong");
    assert_eq!(pong["type"], "pong");

    // 认证入房
    ws.send(Message::Text(
        r#"{"type":"authenticate","userId":"ws_user"}"#.into(),
    ))
    .await
    .unwrap();
    let ack = next_json(&mut ws, 1000).await.expect("Expected authenticated ack");
    assert_eq!(ack["type"], "authenticated");
    assert_eq!(ack["success"], true);

    // 入房前的事件没有补发
    assert!(next_json(&mut ws, 300).await.is_none());

    // 入房后的新信号被推送为 new_signal
    let created = signal_service.create(sample_input("ws_user")).await.unwrap();
    let push = next_json(&mut ws, 2000).await.expect("Expected new_signal push");
    assert_eq!(push["type"], "new_signal");
    assert_eq!(push["data"]["id"], created.id.0.as_str());
    assert_eq!(push["data"]["user_id"], "ws_user");

    // 其他用户的信号不会进入本房间
    signal_service.create(sample_input("someone_else")).await.unwrap();
    assert!(next_json(&mut ws, 300).await.is_none());

    // 确认后收到 signal_update 回声 (跨界面同步的依据)
    signal_service
        .confirm(&created.id, "ws_user", vega_core::common::ConfirmationSource::Chat)
        .await
        .unwrap();
    let push = next_json(&mut ws, 2000).await.expect("Expected signal_update push");
    // 回声与通知都会到达本房间，顺序不保证
    let kind = push["type"].as_str().unwrap();
    assert!(kind == "signal_update" || kind == "notification");

    ws.close(None).await.ok();
}

#[tokio::test]
async fn test_ws_malformed_client_message_is_ignored() {
    let (ws_url, signal_service, _bus) = spawn_ws_server().await;

    let (mut ws, _) = connect_async(&ws_url).await.expect("WS connect failed");

    // 坏消息不会断开连接
    ws.send(Message::Text("not json at all".into())).await.unwrap();
    ws.send(Message::Text(r#"{"type":"unknown_kind"}"#.into())).await.unwrap();

    ws.send(Message::Text(
        r#"{"type":"authenticate","userId":"ws_user2"}"#.into(),
    ))
    .await
    .unwrap();
    let ack = next_json(&mut ws, 1000).await.expect("Expected authenticated ack");
    assert_eq!(ack["type"], "authenticated");

    let created = signal_service.create(sample_input("ws_user2")).await.unwrap();
    let push = next_json(&mut ws, 2000).await.expect("Expected new_signal push");
    assert_eq!(push["type"], "new_signal");
    assert_eq!(push["data"]["id"], created.id.0.as_str());

    ws.close(None).await.ok();
}

#[tokio::test]
async fn test_fanout_survives_malformed_bus_payload() {
    let (ws_url, signal_service, bus) = spawn_ws_server().await;

    let (mut ws, _) = connect_async(&ws_url).await.expect("WS connect failed");
    ws.send(Message::Text(
        r#"{"type":"authenticate","userId":"ws_user3"}"#.into(),
    ))
    .await
    .unwrap();
    next_json(&mut ws, 1000).await.expect("Expected authenticated ack");

    // 总线上的坏载荷被扇出循环吞掉，后续合法事件照常送达
    bus.publish("signals:all", "definitely not json").await.unwrap();
    let created = signal_service.create(sample_input("ws_user3")).await.unwrap();

    let push = next_json(&mut ws, 2000).await.expect("Expected new_signal push");
    assert_eq!(push["type"], "new_signal");
    assert_eq!(push["data"]["id"], created.id.0.as_str());

    ws.close(None).await.ok();
}
