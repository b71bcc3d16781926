use crate::ws::rooms::{PushEvent, RoomRegistry};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vega_core::bus::entity::{
    BusMessage, CHANNEL_SIGNALS_ALL, CHANNEL_SIGNALS_UPDATED, PATTERN_NOTIFICATIONS,
    PATTERN_POSITIONS,
};
use vega_core::bus::port::{BusStream, EventBus};

/// # Summary
/// 网关扇出协程：订阅总线上的四类频道，把事件按 `user_id`
/// 转投到对应的实时房间。
///
/// # Logic
/// 每个订阅各自一条协程，循环内：
/// 1. 在边界处将帧解码为强类型 `BusMessage`；
/// 2. 解码失败记录 warn 后继续——单条坏消息永不中断订阅；
/// 3. 按消息变体映射推送事件名并路由到归属用户的房间。
///
/// # Arguments
/// * `bus` - 事件总线。
/// * `rooms` - 房间注册表。
///
/// # Returns
/// 各订阅协程的句柄，由宿主负责生命周期。
pub fn spawn_fanout(bus: &Arc<dyn EventBus>, rooms: Arc<RoomRegistry>) -> Vec<JoinHandle<()>> {
    info!("Gateway fan-out subscribing to bus channels");
    vec![
        relay(bus.subscribe(CHANNEL_SIGNALS_ALL), rooms.clone()),
        relay(bus.subscribe(CHANNEL_SIGNALS_UPDATED), rooms.clone()),
        relay(bus.subscribe_pattern(PATTERN_POSITIONS), rooms.clone()),
        relay(bus.subscribe_pattern(PATTERN_NOTIFICATIONS), rooms),
    ]
}

/// 单条订阅的转投循环。
fn relay(mut stream: BusStream, rooms: Arc<RoomRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let message = match BusMessage::decode(&frame.channel, &frame.payload) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Dropping undecodable bus frame: {}", e);
                    continue;
                }
            };

            let (kind, data) = match &message {
                BusMessage::Signal(s) => ("new_signal", serde_json::to_value(s)),
                BusMessage::SignalUpdate(s) => ("signal_update", serde_json::to_value(s)),
                BusMessage::Position(p) => ("position_update", serde_json::to_value(p)),
                BusMessage::Notification(n) => ("notification", serde_json::to_value(n)),
            };

            match data {
                Ok(data) => rooms.publish(
                    message.user_id(),
                    PushEvent {
                        kind: kind.to_string(),
                        data,
                    },
                ),
                Err(e) => warn!("Failed to re-encode push payload: {}", e),
            }
        }
    })
}
