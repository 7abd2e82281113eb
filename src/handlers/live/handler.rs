//! Live session WebSocket handler.
//!
//! One browser connection owns one [`SessionManager`]. Incoming JSON
//! messages drive the session lifecycle; binary frames are microphone
//! audio forwarded upstream. Model audio comes back as binary frames,
//! everything else as `type`-tagged JSON.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::live::{GeminiLive, LiveAudioData, LiveError, LiveTransport, TurnEvent};
use crate::errors::AppError;
use crate::session::{ResultSource, SessionManager};
use crate::state::AppState;

use super::messages::{LiveIncomingMessage, LiveMessageRoute, LiveOutgoingMessage, SessionRequest};

/// Maximum WebSocket frame size (2 MB)
const MAX_WS_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Maximum WebSocket message size (2 MB)
const MAX_WS_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Live WebSocket handler.
///
/// Upgrades the HTTP connection to WebSocket; refused up front when the
/// server has no Gemini API key to run sessions with.
pub async fn live_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let Some(api_key) = state.config.gemini_api_key.clone() else {
        return AppError::MissingApiKey.into_response();
    };

    info!("Live WebSocket connection upgrade requested");
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_live_socket(socket, state, api_key))
}

/// Handle one live WebSocket connection.
async fn handle_live_socket(socket: WebSocket, state: Arc<AppState>, api_key: String) {
    let session_id = Uuid::new_v4();
    info!(%session_id, "Live WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::unbounded_channel::<LiveMessageRoute>();

    // Sender task for outgoing frames
    let sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let should_close = matches!(route, LiveMessageRoute::Close);

            let result = match route {
                LiveMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                LiveMessageRoute::Audio(data) => sender.send(Message::Binary(data)).await,
                LiveMessageRoute::Close => sender.send(Message::Close(None)).await,
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
            if should_close {
                break;
            }
        }
    });

    let manager = match build_session(&state, api_key, &route_tx) {
        Ok(manager) => manager,
        Err(e) => {
            send_error(&route_tx, "transport_error", e.to_string());
            let _ = route_tx.send(LiveMessageRoute::Close);
            return;
        }
    };

    let default_model = state.config.default_model;
    // The request that started the session; a reconnect merges over it so
    // settings changed in between take effect.
    let mut last_request: Option<SessionRequest> = None;

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let incoming: LiveIncomingMessage = match serde_json::from_str(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        error!("Failed to parse client message: {}", e);
                        send_error(&route_tx, "parse_error", format!("Invalid message: {e}"));
                        continue;
                    }
                };

                if let Err(e) = incoming.validate_size() {
                    warn!("Message validation failed: {}", e);
                    send_error(&route_tx, "validation_error", e.to_string());
                    continue;
                }

                match incoming {
                    LiveIncomingMessage::Start(request) => {
                        let ctx = request.to_context(default_model);
                        last_request = Some(request);
                        if let Err(e) = manager.start(&ctx).await {
                            warn!(%session_id, "Session start failed: {}", e);
                            send_error(&route_tx, "connect_error", e.to_string());
                        }
                    }
                    LiveIncomingMessage::Disconnect => {
                        manager.disconnect().await;
                    }
                    LiveIncomingMessage::Reconnect(request) => {
                        let merged = match &last_request {
                            Some(previous) => previous.merged_with(&request),
                            None => request,
                        };
                        let ctx = merged.to_context(default_model);
                        last_request = Some(merged);
                        if let Err(e) = manager.reconnect(&ctx).await {
                            warn!(%session_id, "Session reconnect failed: {}", e);
                            send_error(&route_tx, "connect_error", e.to_string());
                        }
                    }
                    LiveIncomingMessage::Text { text } => {
                        if let Err(e) = manager.send_text(&text).await {
                            send_error(&route_tx, "session_error", e.to_string());
                        }
                    }
                    LiveIncomingMessage::Reset => {
                        if let Err(e) = manager.reset() {
                            send_error(&route_tx, "session_error", e.to_string());
                        }
                    }
                }
            }
            Ok(Message::Binary(data)) => {
                if let Err(e) = manager.send_audio(data).await {
                    warn!("Failed to forward audio upstream: {}", e);
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!("WebSocket keepalive");
            }
            Ok(Message::Close(_)) => {
                info!(%session_id, "Live WebSocket close received");
                break;
            }
            Err(e) => {
                warn!(%session_id, "Live WebSocket error: {}", e);
                break;
            }
        }
    }

    // Cleanup
    manager.shutdown().await;
    sender_task.abort();
    info!(%session_id, "Live WebSocket connection terminated");
}

/// Create the transport and session manager for one connection, wiring
/// every event into the outgoing route channel.
fn build_session(
    state: &Arc<AppState>,
    api_key: String,
    route_tx: &mpsc::UnboundedSender<LiveMessageRoute>,
) -> Result<SessionManager, LiveError> {
    let mut transport = GeminiLive::new(api_key)?;

    let tx = route_tx.clone();
    transport.on_audio(Arc::new(move |audio: LiveAudioData| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(LiveMessageRoute::Audio(audio.data));
        })
    }));

    let tx = route_tx.clone();
    transport.on_turn(Arc::new(move |turn: TurnEvent| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(LiveMessageRoute::Outgoing(LiveOutgoingMessage::Turn {
                text: turn.text,
                turn_complete: turn.turn_complete,
                interrupted: turn.interrupted,
            }));
        })
    }));

    let tx = route_tx.clone();
    transport.on_error(Arc::new(move |e: LiveError| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(LiveMessageRoute::Outgoing(LiveOutgoingMessage::Error {
                code: Some("upstream_error".to_string()),
                message: e.to_string(),
            }));
        })
    }));

    let manager = SessionManager::new(Box::new(transport), state.store.clone());

    let tx = route_tx.clone();
    manager.on_result(Arc::new(move |report, source| {
        let _ = tx.send(LiveMessageRoute::Outgoing(LiveOutgoingMessage::Feedback {
            report,
            recovered: source == ResultSource::Recovered,
        }));
    }));

    let tx = route_tx.clone();
    manager.on_phase_change(Arc::new(move |phase| {
        let _ = tx.send(LiveMessageRoute::Outgoing(LiveOutgoingMessage::SessionState {
            phase: phase.name().to_string(),
            origin: phase.disconnect_origin().map(|o| o.as_str().to_string()),
        }));
    }));

    Ok(manager)
}

fn send_error(
    route_tx: &mpsc::UnboundedSender<LiveMessageRoute>,
    code: &str,
    message: impl Into<String>,
) {
    let _ = route_tx.send(LiveMessageRoute::Outgoing(LiveOutgoingMessage::Error {
        code: Some(code.to_string()),
        message: message.into(),
    }));
}
