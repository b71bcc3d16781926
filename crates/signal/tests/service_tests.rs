use chrono::{Duration as ChronoDuration, Utc};
use futures::StreamExt;
use rust_decimal_macros::dec;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use vega_bus::InProcessBus;
use vega_cache::MemCache;
use vega_core::bus::entity::{BusMessage, CHANNEL_SIGNALS_ALL, CHANNEL_SIGNALS_UPDATED};
use vega_core::bus::port::{BusStream, EventBus};
use vega_core::common::{ConfirmationSource, OptionType, TradeAction};
use vega_core::signal::entity::{NewSignal, SignalStatus};
use vega_core::signal::error::SignalError;
use vega_signal::{ExpirySweeper, SignalService};
use vega_store::signal::SqliteSignalStore;

static TEST_ROOT: LazyLock<tempfile::TempDir> =
    LazyLock::new(|| tempfile::tempdir().expect("Failed to create temp dir"));

/// 组装一套完整的服务 (SQLite 存储 + 进程内总线 + 内存缓存)
async fn build_service() -> (Arc<SignalService>, Arc<InProcessBus>) {
    vega_store::config::set_root_dir(TEST_ROOT.path().to_path_buf());
    let store = Arc::new(SqliteSignalStore::new().await.expect("Failed to create store"));
    let bus = Arc::new(InProcessBus::new(64));
    let cache = Arc::new(MemCache::new());
    (SignalService::new(store, bus.clone(), cache), bus)
}

fn sample_input(user_id: &str, ttl_secs: i64) -> NewSignal {
    NewSignal {
        user_id: user_id.to_string(),
        symbol: "TSLA".to_string(),
        strategy_type: "gamma_scalp".to_string(),
        action: TradeAction::Buy,
        option_symbol: "TSLA260116C00300000".to_string(),
        strike_price: dec!(300.00),
        expiration_date: "2026-01-16".parse().unwrap(),
        option_type: OptionType::Call,
        quantity: 1,
        limit_price: None,
        confidence_score: Some(71.0),
        reasoning: None,
        market_conditions: None,
        expires_at: Utc::now() + ChronoDuration::seconds(ttl_secs),
    }
}

async fn next_decoded(stream: &mut BusStream, millis: u64) -> Option<BusMessage> {
    let frame = tokio::time::timeout(Duration::from_millis(millis), stream.next())
        .await
        .ok()
        .flatten()?;
    BusMessage::decode(&frame.channel, &frame.payload).ok()
}

/// 持续读取回声流，直到出现指定信号的 SignalUpdate。
/// 测试共享一条总线，其他用例的回声在此被跳过。
async fn wait_for_update(
    stream: &mut BusStream,
    signal_id: &vega_core::signal::entity::SignalId,
    millis: u64,
) -> Option<vega_core::signal::entity::TradeSignal> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(millis);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let frame = tokio::time::timeout(remaining, stream.next()).await.ok().flatten()?;
        if let Ok(BusMessage::SignalUpdate(s)) = BusMessage::decode(&frame.channel, &frame.payload)
            && s.id == *signal_id
        {
            return Some(s);
        }
    }
}

#[tokio::test]
async fn test_create_publishes_to_signal_channels() {
    let (service, bus) = build_service().await;

    let mut all = bus.subscribe(CHANNEL_SIGNALS_ALL);
    let mut own = bus.subscribe("signals:u_create");

    let created = service.create(sample_input("u_create", 300)).await.unwrap();
    assert_eq!(created.status, SignalStatus::Pending);

    // 两个频道都收到全量记录
    match next_decoded(&mut all, 500).await {
        Some(BusMessage::Signal(s)) => assert_eq!(s.id, created.id),
        other => panic!("Expected Signal on signals:all, got {:?}", other),
    }
    match next_decoded(&mut own, 500).await {
        Some(BusMessage::Signal(s)) => assert_eq!(s.user_id, "u_create"),
        other => panic!("Expected Signal on signals:u_create, got {:?}", other),
    }

    // 落库可查
    let pending = service.pending_for_user("u_create").await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_create_validation() {
    let (service, _bus) = build_service().await;

    let mut bad_user = sample_input("", 300);
    bad_user.user_id = "  ".to_string();
    assert!(matches!(
        service.create(bad_user).await.unwrap_err(),
        SignalError::Validation(_)
    ));

    let mut bad_confidence = sample_input("u_val", 300);
    bad_confidence.confidence_score = Some(140.0);
    assert!(matches!(
        service.create(bad_confidence).await.unwrap_err(),
        SignalError::Validation(_)
    ));

    let stale = sample_input("u_val", -10);
    assert!(matches!(
        service.create(stale).await.unwrap_err(),
        SignalError::Validation(_)
    ));
}

#[tokio::test]
async fn test_confirm_emits_echo_and_notification() {
    let (service, bus) = build_service().await;

    let created = service.create(sample_input("u_echo", 300)).await.unwrap();

    let mut updated = bus.subscribe(CHANNEL_SIGNALS_UPDATED);
    let mut notif = bus.subscribe_pattern("notifications:*");

    let confirmed = service
        .confirm(&created.id, "u_echo", ConfirmationSource::Web)
        .await
        .unwrap();
    assert_eq!(confirmed.status, SignalStatus::Confirmed);

    // 回声事件携带迁移后的全量记录
    match next_decoded(&mut updated, 500).await {
        Some(BusMessage::SignalUpdate(s)) => {
            assert_eq!(s.id, created.id);
            assert_eq!(s.status, SignalStatus::Confirmed);
        }
        other => panic!("Expected SignalUpdate, got {:?}", other),
    }

    // 用户通知同步发出
    match next_decoded(&mut notif, 500).await {
        Some(BusMessage::Notification(n)) => {
            assert_eq!(n.user_id, "u_echo");
            assert_eq!(n.kind, "signal");
        }
        other => panic!("Expected Notification, got {:?}", other),
    }

    // 竞争失败方收到 AlreadyProcessed
    let err = service
        .reject(&created.id, "u_echo", ConfirmationSource::Chat)
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::AlreadyProcessed(_)));

    // 空白操作者被校验拦下
    let err = service
        .confirm(&created.id, "  ", ConfirmationSource::Web)
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::Validation(_)));
}

#[tokio::test]
async fn test_sweep_expired_emits_echo() {
    let (service, bus) = build_service().await;

    let created = service.create(sample_input("u_sweep2", 1)).await.unwrap();
    let mut updated = bus.subscribe(CHANNEL_SIGNALS_UPDATED);

    // 越过失效时间后清扫 (共享库中可能同时扫到其他用例的到期信号)
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let expired = service.sweep_expired(Utc::now()).await.unwrap();
    assert!(expired.iter().any(|s| s.id == created.id));

    let echoed = wait_for_update(&mut updated, &created.id, 1000)
        .await
        .expect("Echo should be emitted for the swept signal");
    assert_eq!(echoed.status, SignalStatus::Expired);

    // 已过期的信号不能再确认
    let err = service
        .confirm(&created.id, "u_sweep2", ConfirmationSource::Web)
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::AlreadyProcessed(_)));
}

#[tokio::test]
async fn test_sweeper_task_expires_due_signals() {
    let (service, bus) = build_service().await;

    let created = service.create(sample_input("u_task", 1)).await.unwrap();
    let mut updated = bus.subscribe(CHANNEL_SIGNALS_UPDATED);

    let handle = ExpirySweeper::new(service.clone(), Duration::from_millis(200)).spawn();

    // 清扫协程应在几个周期内处理到期信号
    let echoed = wait_for_update(&mut updated, &created.id, 5000)
        .await
        .expect("Sweeper should emit an echo in time");
    assert_eq!(echoed.status, SignalStatus::Expired);

    let stored = service.get(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SignalStatus::Expired);

    handle.abort();
}

#[tokio::test]
async fn test_pause_resume_round_trip() {
    let (service, _bus) = build_service().await;

    assert!(!service.is_paused("u_pause").await.unwrap());
    service.pause_trading("u_pause").await.unwrap();
    assert!(service.is_paused("u_pause").await.unwrap());
    service.resume_trading("u_pause").await.unwrap();
    assert!(!service.is_paused("u_pause").await.unwrap());
}
