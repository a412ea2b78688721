//! Web chat channel: WebSocket chat for the browser client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingMessage};
use crate::error::ChannelError;
use crate::onboarding::message::InboundPayload;
use crate::store::Database;

const CHANNEL_NAME: &str = "webchat";

// ── JSON Protocol ───────────────────────────────────────────────────────

/// Frame from browser → server. Same shape as `InboundPayload`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Text {
        text: String,
    },
    Choice {
        value: String,
        #[serde(default)]
        label: Option<String>,
    },
}

impl ClientFrame {
    /// `None` for frames with nothing in them.
    fn into_payload(self) -> Option<InboundPayload> {
        match self {
            Self::Text { text } => {
                let text = text.trim();
                (!text.is_empty()).then(|| InboundPayload::text(text))
            }
            Self::Choice { value, label } => {
                (!value.trim().is_empty()).then_some(InboundPayload::Choice { value, label })
            }
        }
    }
}

/// Frame from server → browser.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    ConversationCreated { conversation_id: Uuid },
    MessageCreated(OutgoingMessage),
    Error { message: String },
}

// ── Shared State ────────────────────────────────────────────────────────

struct WebchatInner {
    db: Arc<dyn Database>,
    /// WS handlers → `Channel::start` stream.
    incoming_tx: mpsc::UnboundedSender<IncomingMessage>,
    /// One sender per connected conversation.
    sessions: RwLock<HashMap<Uuid, mpsc::UnboundedSender<ServerFrame>>>,
}

#[derive(Clone)]
struct WsState {
    inner: Arc<WebchatInner>,
}

// ── WebchatChannel ──────────────────────────────────────────────────────

/// A WebSocket channel for the browser chat client.
///
/// Every socket is its own conversation. `start()` returns a stream backed
/// by an mpsc receiver that all socket handlers feed, and `send()` looks up
/// the socket holding the message's conversation.
pub struct WebchatChannel {
    inner: Arc<WebchatInner>,
    /// Consumed once in `start()`.
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>,
}

impl WebchatChannel {
    pub fn new(db: Arc<dyn Database>) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(WebchatInner {
            db,
            incoming_tx,
            sessions: RwLock::new(HashMap::new()),
        });

        Self {
            inner,
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Build an Axum router with the `/ws/chat` endpoint.
    pub fn router(&self) -> Router {
        let state = WsState {
            inner: Arc::clone(&self.inner),
        };

        Router::new()
            .route("/ws/chat", get(ws_chat_handler))
            .with_state(state)
    }

    /// Number of connected sockets.
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

#[async_trait]
impl Channel for WebchatChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "start() already called".to_string(),
            })?;

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        let sessions = self.inner.sessions.read().await;
        let tx = sessions
            .get(&message.conversation_id)
            .ok_or_else(|| ChannelError::SendFailed {
                name: CHANNEL_NAME.to_string(),
                reason: format!("no client for conversation {}", message.conversation_id),
            })?;
        tx.send(ServerFrame::MessageCreated(message.clone()))
            .map_err(|_| ChannelError::Disconnected {
                name: CHANNEL_NAME.to_string(),
                reason: format!("client for conversation {} went away", message.conversation_id),
            })
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        // Dropping the senders ends every socket loop.
        self.inner.sessions.write().await.clear();
        Ok(())
    }
}

// ── WebSocket Handler ───────────────────────────────────────────────────

async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
) -> impl IntoResponse {
    debug!("Web chat client connecting");
    ws.on_upgrade(|socket| handle_chat_socket(socket, state.inner))
}

async fn handle_chat_socket(mut socket: WebSocket, inner: Arc<WebchatInner>) {
    let conversation_id = Uuid::new_v4();
    let user_id = format!("webchat-{conversation_id}");

    if let Err(e) = inner
        .db
        .ensure_conversation(conversation_id, CHANNEL_NAME, &user_id)
        .await
    {
        warn!(%conversation_id, "Failed to create conversation: {}", e);
        let _ = send_frame(
            &mut socket,
            &ServerFrame::Error {
                message: "could not start a conversation".to_string(),
            },
        )
        .await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    inner.sessions.write().await.insert(conversation_id, tx);
    info!(%conversation_id, "Web chat client connected");

    if send_frame(&mut socket, &ServerFrame::ConversationCreated { conversation_id })
        .await
        .is_ok()
    {
        chat_loop(&mut socket, &inner, conversation_id, &user_id, &mut rx).await;
    }

    inner.sessions.write().await.remove(&conversation_id);
    info!(%conversation_id, "Web chat connection closed");
}

async fn chat_loop(
    socket: &mut WebSocket,
    inner: &WebchatInner,
    conversation_id: Uuid,
    user_id: &str,
    rx: &mut mpsc::UnboundedReceiver<ServerFrame>,
) {
    loop {
        tokio::select! {
            // Forward server frames to this client
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    debug!(%conversation_id, "Web chat session closed by server");
                    break;
                };
                if send_frame(socket, &frame).await.is_err() {
                    debug!(%conversation_id, "Web chat client disconnected during send");
                    break;
                }
            }

            // Receive frames from the client
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        let payload = match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => frame.into_payload(),
                            Err(e) => {
                                debug!(error = %e, text = %text, "Invalid JSON from web chat client");
                                let frame = ServerFrame::Error {
                                    message: format!("invalid message: {e}"),
                                };
                                if send_frame(socket, &frame).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };
                        let Some(payload) = payload else {
                            continue;
                        };
                        let msg = IncomingMessage::new(CHANNEL_NAME, conversation_id, user_id, payload);
                        if inner.incoming_tx.send(msg).is_err() {
                            warn!("Web chat incoming channel closed");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%conversation_id, "Web chat client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Web chat WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to encode web chat frame: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn client_frames_map_to_payloads() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"text","text":"  hi  "}"#).unwrap();
        assert_eq!(frame.into_payload(), Some(InboundPayload::text("hi")));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"choice","value":"exploring","label":"Just looking"}"#)
                .unwrap();
        assert_eq!(
            frame.into_payload(),
            Some(InboundPayload::Choice {
                value: "exploring".into(),
                label: Some("Just looking".into()),
            })
        );
    }

    #[test]
    fn blank_frames_are_dropped() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"text","text":"   "}"#).unwrap();
        assert_eq!(frame.into_payload(), None);
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"message","content":"x"}"#).is_err());
    }

    #[test]
    fn message_created_is_flattened() {
        let conversation_id = Uuid::new_v4();
        let frame = ServerFrame::MessageCreated(OutgoingMessage {
            id: Uuid::new_v4(),
            conversation_id,
            is_bot: true,
            payload: serde_json::json!({"type": "text", "text": "hi"}),
            created_at: Utc::now(),
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "message_created");
        assert_eq!(json["conversation_id"], conversation_id.to_string());
        assert_eq!(json["payload"]["text"], "hi");

        let json = serde_json::to_value(ServerFrame::ConversationCreated { conversation_id }).unwrap();
        assert_eq!(json["type"], "conversation_created");
    }

    #[tokio::test]
    async fn send_without_client_fails() {
        let db = Arc::new(crate::store::LibSqlBackend::new_memory().await.unwrap());
        let channel = WebchatChannel::new(db);
        let msg = OutgoingMessage::ephemeral(
            Uuid::new_v4(),
            &crate::onboarding::message::OutboundMessage::text("hi"),
        );
        assert!(matches!(
            channel.send(&msg).await,
            Err(ChannelError::SendFailed { .. })
        ));
        assert_eq!(channel.session_count().await, 0);
    }
}
