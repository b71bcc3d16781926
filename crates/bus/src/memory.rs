use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use vega_core::bus::error::BusError;
use vega_core::bus::port::{BusFrame, BusStream, EventBus};

/// # Summary
/// 基于 `tokio::sync::broadcast` 的进程内事件总线。
/// 每个字面频道与每个订阅模式各持有一条广播通道；
/// 发布时先投递精确频道，再逐一投递所有命中的模式通道。
///
/// # Invariants
/// - 发布即忘：无订阅者时 `send` 的失败被静默忽略。
/// - 至多一次：订阅建立之前发布的消息不可见，无排队、无重放。
/// - 慢消费者滞后时丢弃最旧消息并记录 warn，订阅流不中断。
pub struct InProcessBus {
    // 精确频道注册表
    channels: DashMap<String, broadcast::Sender<BusFrame>>,
    // 模式订阅注册表，Key 为 glob 模式
    patterns: DashMap<String, broadcast::Sender<BusFrame>>,
    // 每条通道的容量
    capacity: usize,
}

impl InProcessBus {
    /// # Summary
    /// 创建一个新的总线实例。
    ///
    /// # Arguments
    /// * `capacity`: 每条 broadcast 通道的容量，慢消费者超出后丢最旧。
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            patterns: DashMap::new(),
            capacity,
        }
    }

    /// 取出 (或创建) 指定注册表中的发送端。DashMap entry 保证
    /// 并发首次订阅/发布时只创建一条通道。
    fn sender_for(
        registry: &DashMap<String, broadcast::Sender<BusFrame>>,
        key: &str,
        capacity: usize,
    ) -> broadcast::Sender<BusFrame> {
        registry
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone()
    }

    /// 将广播接收端包装为对滞后免疫的订阅流。
    fn stream_from(mut rx: broadcast::Receiver<BusFrame>, label: String) -> BusStream {
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(frame) => yield frame,
                    Err(RecvError::Lagged(n)) => {
                        warn!("Bus subscriber '{}' lagged, {} message(s) dropped", label, n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[async_trait]
impl EventBus for InProcessBus {
    /// # Summary
    /// 向频道发布一条 JSON 载荷。
    ///
    /// # Logic
    /// 1. 若精确频道已有通道则投递。
    /// 2. 遍历模式注册表，向所有命中的模式通道投递同一帧。
    /// 3. `send` 失败仅意味着当下没有任何接收者，按契约静默成功。
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let frame = BusFrame {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };

        if let Some(sender) = self.channels.get(channel) {
            sender.send(frame.clone()).ok();
        }

        for entry in self.patterns.iter() {
            if glob_match(entry.key(), channel) {
                entry.value().send(frame.clone()).ok();
            }
        }

        Ok(())
    }

    /// # Summary
    /// 按精确频道名订阅，返回从订阅时刻起的投递流。
    fn subscribe(&self, channel: &str) -> BusStream {
        let sender = Self::sender_for(&self.channels, channel, self.capacity);
        Self::stream_from(sender.subscribe(), channel.to_string())
    }

    /// # Summary
    /// 按 glob 模式订阅，命中模式的所有字面频道共用此流。
    fn subscribe_pattern(&self, pattern: &str) -> BusStream {
        let sender = Self::sender_for(&self.patterns, pattern, self.capacity);
        Self::stream_from(sender.subscribe(), pattern.to_string())
    }
}

/// glob 匹配：`*` 匹配任意 (含空) 字符序列，其余字符逐一比对。
///
/// # Logic
/// 经典的回溯指针算法：记录最近一个 `*` 的位置，失配时回退，
/// 让该 `*` 多吞一个字符。对 `positions:*` 这类尾部通配 O(n)。
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
