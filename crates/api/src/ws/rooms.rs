use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

/// 每个房间的推送缓冲容量
const ROOM_CAPACITY: usize = 64;

/// # Summary
/// 推送给客户端的事件：`{"type": ..., "data": ...}`。
#[derive(Debug, Clone, Serialize)]
pub struct PushEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

/// # Summary
/// 按用户划分的实时房间注册表。
/// 一个房间对应一条 broadcast 通道，同一用户的多条连接共享房间。
///
/// # Invariants
/// - 注册表是纯内存的活性状态，不持久化；进程重启后由客户端
///   重新 authenticate 重建。
/// - 推送时发现房间已无接收者则顺手摘除表项，防止注册表无界增长。
pub struct RoomRegistry {
    rooms: DashMap<String, broadcast::Sender<PushEvent>>,
}

impl RoomRegistry {
    /// # Summary
    /// 创建空注册表。
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// # Summary
    /// 将一条连接加入用户房间，返回该连接专属的接收端。
    ///
    /// # Logic
    /// DashMap entry 保证并发加入时只建一条通道。
    pub fn join(&self, user_id: &str) -> broadcast::Receiver<PushEvent> {
        self.rooms
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// # Summary
    /// 向用户房间推送一个事件。
    ///
    /// # Logic
    /// 1. 房间不存在 (用户不在线) 时直接丢弃——至多一次语义。
    /// 2. 发送失败说明最后一条连接已断开，摘除房间表项。
    pub fn publish(&self, user_id: &str, event: PushEvent) {
        let dead = match self.rooms.get(user_id) {
            Some(sender) => sender.send(event).is_err(),
            None => false,
        };
        if dead {
            self.rooms.remove(user_id);
        }
    }

    /// 当前活跃房间数 (仅供测试观察)。
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
