use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use vega_core::bus::entity::{BusMessage, CHANNEL_SIGNALS_ALL};
use vega_core::bus::port::EventBus;
use vega_bus::InProcessBus;

/// 带超时地取下一帧，None 表示在窗口内未收到任何消息
async fn next_frame(
    stream: &mut vega_core::bus::port::BusStream,
    millis: u64,
) -> Option<vega_core::bus::port::BusFrame> {
    tokio::time::timeout(Duration::from_millis(millis), stream.next())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_pattern_match_delivery() {
    let bus = InProcessBus::new(16);

    let mut positions = bus.subscribe_pattern("positions:*");
    let mut notifications = bus.subscribe_pattern("notifications:*");

    bus.publish("positions:closed:123", r#"{"x":1}"#).await.unwrap();

    // positions:* 命中，notifications:* 不命中
    let frame = next_frame(&mut positions, 500).await.expect("Should be delivered");
    assert_eq!(frame.channel, "positions:closed:123");
    assert_eq!(frame.payload, r#"{"x":1}"#);

    assert!(next_frame(&mut notifications, 100).await.is_none());
}

#[tokio::test]
async fn test_exact_and_pattern_both_delivered() {
    let bus = InProcessBus::new(16);

    let mut exact = bus.subscribe("positions:u1");
    let mut pattern = bus.subscribe_pattern("positions:*");

    bus.publish("positions:u1", r#"{"k":"v"}"#).await.unwrap();

    assert!(next_frame(&mut exact, 500).await.is_some());
    assert!(next_frame(&mut pattern, 500).await.is_some());
}

#[tokio::test]
async fn test_late_join_misses_earlier_publish() {
    let bus = InProcessBus::new(16);

    // 订阅建立之前的发布对订阅者不可见 (至多一次，无重放)
    bus.publish(CHANNEL_SIGNALS_ALL, r#"{"early":true}"#).await.unwrap();

    let mut sub = bus.subscribe(CHANNEL_SIGNALS_ALL);
    assert!(next_frame(&mut sub, 100).await.is_none());

    bus.publish(CHANNEL_SIGNALS_ALL, r#"{"late":true}"#).await.unwrap();
    let frame = next_frame(&mut sub, 500).await.expect("Should be delivered");
    assert_eq!(frame.payload, r#"{"late":true}"#);
}

#[tokio::test]
async fn test_publish_without_subscribers_is_silent_success() {
    let bus = InProcessBus::new(16);
    bus.publish("signals:nobody", "{}").await.unwrap();
}

#[tokio::test]
async fn test_malformed_payload_does_not_break_subscription() {
    let bus = InProcessBus::new(16);
    let mut sub = bus.subscribe(CHANNEL_SIGNALS_ALL);

    // 非 JSON 字符串与合法载荷各发一条
    bus.publish(CHANNEL_SIGNALS_ALL, "definitely not json").await.unwrap();
    let notif = r#"{"user_id":"u1","title":"t","message":"m","type":"info"}"#;
    bus.publish("notifications:u1", notif).await.unwrap();
    bus.publish(CHANNEL_SIGNALS_ALL, "{\"still\":\"junk shape\"}").await.unwrap();

    // 第一帧解码失败但流继续，后续帧照常投递
    let first = next_frame(&mut sub, 500).await.expect("Frame should arrive");
    assert!(BusMessage::decode(&first.channel, &first.payload).is_err());

    let second = next_frame(&mut sub, 500).await.expect("Frame should arrive");
    assert_eq!(second.payload, "{\"still\":\"junk shape\"}");
}

#[tokio::test]
async fn test_per_channel_fifo_for_single_publisher() {
    let bus = Arc::new(InProcessBus::new(64));
    let mut sub = bus.subscribe("signals:u9");

    for i in 0..10 {
        bus.publish("signals:u9", &format!("{{\"seq\":{i}}}")).await.unwrap();
    }

    for i in 0..10 {
        let frame = next_frame(&mut sub, 500).await.expect("Frame should arrive");
        assert_eq!(frame.payload, format!("{{\"seq\":{i}}}"));
    }
}
