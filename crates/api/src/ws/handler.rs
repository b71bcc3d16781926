use crate::server::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::ws::rooms::PushEvent;

/// 客户端上行消息，按 `type` 字段打标签
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// 入房申请：携带用户 id。认证之前收到的任何消息不归属任何房间。
    Authenticate {
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// 活性探测
    Ping,
}

/// 服务端确认消息
#[derive(Debug, Serialize)]
struct ServerAck<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    success: bool,
}

/// WebSocket 升级入口
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| client_loop(socket, state))
}

/// # Summary
/// 单条连接的协议循环。
///
/// # Logic
/// 1. 未认证阶段只接受 `authenticate` 与 `ping`；
/// 2. `authenticate` 后加入对应用户房间，开始接收推送；
///    更早发布的事件不会补发 (至多一次，无重放)；
/// 3. 推送通道滞后时丢最旧并继续；
/// 4. 对端关闭或发送失败即退出，房间表项由注册表惰性回收。
async fn client_loop(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut room_rx: Option<broadcast::Receiver<PushEvent>> = None;

    info!("WebSocket client connected");

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else {
                    debug!("WebSocket client disconnected");
                    break;
                };
                let Message::Text(text) = message else {
                    // 二进制帧与底层 ping/pong 直接忽略
                    continue;
                };

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Authenticate { user_id }) => {
                        if user_id.trim().is_empty() {
                            warn!("WebSocket authenticate with empty userId ignored");
                            continue;
                        }
                        info!("WebSocket client joined room user:{}", user_id);
                        room_rx = Some(state.rooms.join(&user_id));
                        let ack = ServerAck { kind: "authenticated", success: true };
                        if send_json(&mut sink, &ack).await.is_err() {
                            break;
                        }
                    }
                    Ok(ClientMessage::Ping) => {
                        let ack = ServerAck { kind: "pong", success: true };
                        if send_json(&mut sink, &ack).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // 坏消息不终止连接
                        warn!("Unparseable WebSocket message ignored: {}", e);
                    }
                }
            }

            push = recv_push(&mut room_rx) => {
                match push {
                    Some(event) => {
                        if send_json(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

/// 从房间接收下一个推送；未入房时永远挂起 (等待 select 的另一分支)。
async fn recv_push(room_rx: &mut Option<broadcast::Receiver<PushEvent>>) -> Option<PushEvent> {
    match room_rx {
        Some(rx) => loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!("WebSocket push lagged, {} event(s) dropped", n);
                }
                Err(RecvError::Closed) => return None,
            }
        },
        None => std::future::pending().await,
    }
}

/// 序列化并发送一个 JSON 文本帧。
async fn send_json<T: Serialize>(
    sink: &mut (impl futures::Sink<Message> + Unpin),
    value: &T,
) -> Result<(), ()> {
    let text = serde_json::to_string(value).map_err(|e| {
        warn!("Failed to encode WebSocket frame: {}", e);
    })?;
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}
