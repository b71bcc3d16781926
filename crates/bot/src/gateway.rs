use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};
use vega_core::chat::entity::{CardAction, ChannelRef, ChatEvent, MessageRef};

/// Gateway intents: GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT.
const INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15);

/// Reconnect backoff bounds.
const BACKOFF_MIN: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Inbound gateway frame. `d` stays lazily typed until `t` is known.
#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<i64>,
    #[serde(default)]
    t: Option<String>,
}

/// # Summary
/// Minimal Discord Gateway client: one WebSocket connection handling
/// HELLO/heartbeat/IDENTIFY, decoding `MESSAGE_CREATE` (text commands)
/// and `INTERACTION_CREATE` (card buttons) into [`ChatEvent`]s.
///
/// # Invariants
/// * Unknown opcodes and dispatch types are ignored, never fatal.
/// * Close or transport error tears the connection down and reconnects
///   with capped exponential backoff; events during the gap are lost.
///   The platform re-delivers nothing, consistent with the
///   at-most-once posture of the rest of the system.
pub struct DiscordGateway {
    token: String,
    gateway_url: String,
    command_prefix: String,
    events_tx: mpsc::Sender<ChatEvent>,
}

impl DiscordGateway {
    /// # Summary
    /// Creates the gateway client.
    ///
    /// # Arguments
    /// * `token` - Bot token used in IDENTIFY.
    /// * `gateway_url` - e.g. `wss://gateway.discord.gg/?v=10&encoding=json`.
    /// * `command_prefix` - Text command prefix for MESSAGE_CREATE parsing.
    /// * `events_tx` - Sink the decoded events are pushed into.
    pub fn new(
        token: String,
        gateway_url: String,
        command_prefix: String,
        events_tx: mpsc::Sender<ChatEvent>,
    ) -> Self {
        Self {
            token,
            gateway_url,
            command_prefix,
            events_tx,
        }
    }

    /// # Summary
    /// Spawns the connection supervisor: connect, run until the
    /// transport drops, back off, repeat.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = BACKOFF_MIN;
            loop {
                info!("Connecting to Discord gateway: {}", self.gateway_url);
                match tokio_tungstenite::connect_async(&self.gateway_url).await {
                    Ok((ws_stream, _)) => {
                        backoff = BACKOFF_MIN;
                        self.run_connection(ws_stream).await;
                    }
                    Err(e) => {
                        error!("Gateway connect failed: {}", e);
                    }
                }

                warn!("Gateway connection lost, reconnecting in {:?}", backoff);
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_MAX);
            }
        })
    }

    /// One connection's lifetime: read loop + writer + heartbeat.
    async fn run_connection(
        &self,
        ws_stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) {
        let (mut write, mut read) = ws_stream.split();

        // 写入走独立协程，心跳与主循环共用一个出站队列
        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
        let writer = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        // 最近一次收到的序号，-1 表示尚无 (心跳里发 null)
        let last_seq = Arc::new(AtomicI64::new(-1));
        let mut heartbeat: Option<JoinHandle<()>> = None;

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("Unparseable gateway frame ignored: {}", e);
                            continue;
                        }
                    };
                    if let Some(seq) = payload.s {
                        last_seq.store(seq, Ordering::Relaxed);
                    }

                    match payload.op {
                        // HELLO: 启动心跳并递交 IDENTIFY
                        10 => {
                            let interval_ms = payload.d["heartbeat_interval"].as_u64().unwrap_or(41_250);
                            heartbeat = Some(spawn_heartbeat(
                                out_tx.clone(),
                                last_seq.clone(),
                                Duration::from_millis(interval_ms),
                            ));
                            let identify = json!({
                                "op": 2,
                                "d": {
                                    "token": self.token,
                                    "intents": INTENTS,
                                    "properties": {
                                        "os": "linux",
                                        "browser": "vega",
                                        "device": "vega",
                                    },
                                },
                            });
                            if out_tx.send(identify.to_string()).await.is_err() {
                                break;
                            }
                        }
                        // 服务端主动要心跳
                        1 => {
                            let beat = heartbeat_frame(&last_seq);
                            if out_tx.send(beat).await.is_err() {
                                break;
                            }
                        }
                        // 心跳确认
                        11 => {}
                        // RECONNECT / INVALID SESSION：撕掉连接重来
                        7 | 9 => {
                            warn!("Gateway requested reconnect (op {})", payload.op);
                            break;
                        }
                        // DISPATCH
                        0 => {
                            if let (Some(event), data) = (payload.t.as_deref(), &payload.d)
                                && let Some(chat_event) =
                                    parse_dispatch(event, data, &self.command_prefix)
                                && self.events_tx.send(chat_event).await.is_err()
                            {
                                // 消费端没了，连接也没有存在的意义
                                break;
                            }
                        }
                        other => debug!("Ignoring gateway op {}", other),
                    }
                }
                Ok(Message::Ping(data)) => {
                    // tungstenite 自动回 pong，这里只为不落进兜底分支
                    debug!("Gateway ping ({} bytes)", data.len());
                }
                Ok(Message::Close(_)) => {
                    debug!("Gateway close frame received");
                    break;
                }
                Err(e) => {
                    error!("Gateway transport error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        if let Some(handle) = heartbeat {
            handle.abort();
        }
        writer.abort();
    }
}

/// Builds one heartbeat frame (`d` is the last seq, or null before any).
fn heartbeat_frame(last_seq: &AtomicI64) -> String {
    let seq = last_seq.load(Ordering::Relaxed);
    let d = if seq < 0 { Value::Null } else { json!(seq) };
    json!({ "op": 1, "d": d }).to_string()
}

/// Spawns the fixed-interval heartbeat loop.
fn spawn_heartbeat(
    out_tx: mpsc::Sender<String>,
    last_seq: Arc<AtomicI64>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 第一拍立即到期，跳过它避免 HELLO 后连发两帧
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if out_tx.send(heartbeat_frame(&last_seq)).await.is_err() {
                break;
            }
        }
    })
}

/// # Summary
/// Decodes one DISPATCH event into a [`ChatEvent`].
///
/// # Logic
/// * `MESSAGE_CREATE`: non-bot author + prefixed content → `Command`.
/// * `INTERACTION_CREATE`: component interaction (type 3) whose
///   `custom_id` is `<action>_<signal_id>` → `Action`.
/// * Everything else → None.
fn parse_dispatch(event: &str, data: &Value, prefix: &str) -> Option<ChatEvent> {
    match event {
        "MESSAGE_CREATE" => {
            if data["author"]["bot"].as_bool().unwrap_or(false) {
                return None;
            }
            let content = data["content"].as_str()?;
            let stripped = content.strip_prefix(prefix)?;
            let mut words = stripped.split_whitespace();
            let command = words.next()?.to_lowercase();

            Some(ChatEvent::Command {
                discord_user_id: data["author"]["id"].as_str()?.to_string(),
                channel_id: ChannelRef(data["channel_id"].as_str()?.to_string()),
                command,
                args: words.map(str::to_string).collect(),
            })
        }
        "INTERACTION_CREATE" => {
            // 3 = message component (button)
            if data["type"].as_i64() != Some(3) {
                return None;
            }
            let custom_id = data["data"]["custom_id"].as_str()?;
            let (action_word, signal_id) = custom_id.split_once('_')?;
            let action = CardAction::from_prefix(action_word)?;

            // 私信里是 user，服务器频道里是 member.user
            let user = if data["user"].is_object() {
                &data["user"]
            } else {
                &data["member"]["user"]
            };

            Some(ChatEvent::Action {
                discord_user_id: user["id"].as_str()?.to_string(),
                interaction_id: data["id"].as_str()?.to_string(),
                interaction_token: data["token"].as_str()?.to_string(),
                channel_id: ChannelRef(data["channel_id"].as_str()?.to_string()),
                message_id: MessageRef(data["message"]["id"].as_str()?.to_string()),
                action,
                signal_id: signal_id.to_string(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_create_command() {
        let data = json!({
            "author": { "id": "disc_1", "bot": false },
            "channel_id": "chan_9",
            "content": "!signals now please",
        });
        let event = parse_dispatch("MESSAGE_CREATE", &data, "!").unwrap();
        match event {
            ChatEvent::Command { discord_user_id, channel_id, command, args } => {
                assert_eq!(discord_user_id, "disc_1");
                assert_eq!(channel_id.0, "chan_9");
                assert_eq!(command, "signals");
                assert_eq!(args, vec!["now".to_string(), "please".to_string()]);
            }
            other => panic!("Expected Command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_message_create_ignores_bots_and_plain_text() {
        let bot = json!({
            "author": { "id": "disc_1", "bot": true },
            "channel_id": "chan_9",
            "content": "!signals",
        });
        assert!(parse_dispatch("MESSAGE_CREATE", &bot, "!").is_none());

        let plain = json!({
            "author": { "id": "disc_1", "bot": false },
            "channel_id": "chan_9",
            "content": "good morning",
        });
        assert!(parse_dispatch("MESSAGE_CREATE", &plain, "!").is_none());
    }

    #[test]
    fn test_parse_interaction_create_button() {
        let data = json!({
            "type": 3,
            "id": "inter_1",
            "token": "tok_abc",
            "channel_id": "chan_9",
            "message": { "id": "msg_5" },
            "member": { "user": { "id": "disc_1" } },
            "data": { "custom_id": "confirm_sig-123" },
        });
        let event = parse_dispatch("INTERACTION_CREATE", &data, "!").unwrap();
        match event {
            ChatEvent::Action { action, signal_id, discord_user_id, message_id, .. } => {
                assert_eq!(action, CardAction::Confirm);
                assert_eq!(signal_id, "sig-123");
                assert_eq!(discord_user_id, "disc_1");
                assert_eq!(message_id.0, "msg_5");
            }
            other => panic!("Expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_interaction_unknown_custom_id_ignored() {
        let data = json!({
            "type": 3,
            "id": "inter_1",
            "token": "tok_abc",
            "channel_id": "chan_9",
            "message": { "id": "msg_5" },
            "user": { "id": "disc_1" },
            "data": { "custom_id": "snooze_sig-123" },
        });
        assert!(parse_dispatch("INTERACTION_CREATE", &data, "!").is_none());
    }

    #[test]
    fn test_heartbeat_frame_null_then_seq() {
        let seq = AtomicI64::new(-1);
        let frame: Value = serde_json::from_str(&heartbeat_frame(&seq)).unwrap();
        assert_eq!(frame["op"], 1);
        assert!(frame["d"].is_null());

        seq.store(42, Ordering::Relaxed);
        let frame: Value = serde_json::from_str(&heartbeat_frame(&seq)).unwrap();
        assert_eq!(frame["d"], 42);
    }
}
