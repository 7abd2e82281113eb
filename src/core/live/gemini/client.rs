//! Gemini Live API client implementation.
//!
//! Implements [`LiveTransport`] over the `BidiGenerateContent` WebSocket
//! API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<API_KEY>`
//! - Protocol: WebSocket with single-key JSON messages
//! - Audio: PCM 16-bit mono, 16kHz in / 24kHz out, base64 encoded
//!
//! # Connection Model
//!
//! `connect` opens the socket, sends the `setup` message and waits for the
//! server's `setupComplete` acknowledgment before resolving. A spawned
//! read task then dispatches server messages to the registered callbacks
//! and feeds outgoing messages from an mpsc channel into the socket.
//!
//! There is no automatic reconnection: when the server drops the
//! connection, the close callback fires with `initiated_locally == false`
//! and the session layer decides what happens next.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::core::live::base::{
    AudioOutputCallback, CloseCallback, CloseEvent, ConnectionState, LiveAudioData, LiveConfig,
    LiveError, LiveErrorCallback, LiveResult, LiveTransport, ToolAck, ToolCallCallback,
    TurnCallback, TurnEvent,
};

use super::config::{GEMINI_LIVE_URL, GEMINI_OUTPUT_SAMPLE_RATE, GEMINI_SETUP_TIMEOUT_SECS};
use super::messages::{
    ClientContentPayload, ClientMessage, Content, MediaChunk, RealtimeInputPayload, ServerMessage,
    SetupPayload,
};

/// Channel capacity for outgoing WebSocket messages.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Registered event callbacks, one replaceable slot per event kind.
#[derive(Default)]
struct CallbackSlots {
    tool_call: Mutex<Option<ToolCallCallback>>,
    audio: Mutex<Option<AudioOutputCallback>>,
    turn: Mutex<Option<TurnCallback>>,
    close: Mutex<Option<CloseCallback>>,
    error: Mutex<Option<LiveErrorCallback>>,
}

// =============================================================================
// Gemini Live Client
// =============================================================================

/// Gemini Live API client.
///
/// All mutable state is behind `Arc` so the spawned read task and the
/// owning handle observe the same connection flags.
pub struct GeminiLive {
    /// API key, passed as a query parameter
    api_key: String,
    /// WebSocket endpoint (overridable for tests)
    endpoint: String,
    /// Connection state
    state: Arc<Mutex<ConnectionState>>,
    /// Connected flag for lock-free checks (shared with the read task)
    connected: Arc<AtomicBool>,
    /// Set by `disconnect` so a local teardown is not reported as a
    /// server-initiated drop
    intentional_disconnect: Arc<AtomicBool>,
    /// Outgoing message channel
    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientMessage>>>>,
    /// Event callbacks
    callbacks: Arc<CallbackSlots>,
    /// Resolves `connect` once `setupComplete` arrives
    setup_waiter: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    /// Read task handle
    read_handle: Mutex<Option<JoinHandle<()>>>,
}

impl GeminiLive {
    /// Create a new client for the production endpoint.
    pub fn new(api_key: impl Into<String>) -> LiveResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LiveError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            endpoint: GEMINI_LIVE_URL.to_string(),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
            ws_sender: Arc::new(Mutex::new(None)),
            callbacks: Arc::new(CallbackSlots::default()),
            setup_waiter: Arc::new(Mutex::new(None)),
            read_handle: Mutex::new(None),
        })
    }

    /// Override the WebSocket endpoint. Used by integration tests that run
    /// against a local server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Build the WebSocket URL with the API key.
    fn build_ws_url(&self) -> LiveResult<String> {
        let url = url::Url::parse_with_params(&self.endpoint, &[("key", self.api_key.as_str())])
            .map_err(|e| LiveError::InvalidConfiguration(e.to_string()))?;
        Ok(url.into())
    }

    /// Send a message through the outgoing channel.
    async fn send_message(&self, message: ClientMessage) -> LiveResult<()> {
        let sender = self.ws_sender.lock().clone();
        match sender {
            Some(sender) => sender
                .send(message)
                .await
                .map_err(|e| LiveError::WebSocketError(e.to_string())),
            None => Err(LiveError::NotConnected),
        }
    }

    /// Dispatch one server message to the registered callbacks.
    async fn handle_server_message(
        message: ServerMessage,
        callbacks: &Arc<CallbackSlots>,
        setup_waiter: &Arc<Mutex<Option<oneshot::Sender<()>>>>,
    ) {
        match message {
            ServerMessage::SetupComplete(_) => {
                tracing::info!("Gemini Live session setup acknowledged");
                if let Some(waiter) = setup_waiter.lock().take() {
                    let _ = waiter.send(());
                }
            }

            ServerMessage::ServerContent(content) => {
                let audio_cb = callbacks.audio.lock().clone();
                if let Some(cb) = audio_cb {
                    for chunk in content.audio_chunks() {
                        cb(LiveAudioData {
                            data: chunk,
                            sample_rate: GEMINI_OUTPUT_SAMPLE_RATE,
                        })
                        .await;
                    }
                }

                let text = content.text();
                let turn_complete = content.turn_complete.unwrap_or(false);
                let interrupted = content.interrupted.unwrap_or(false);
                if text.is_some() || turn_complete || interrupted {
                    let turn_cb = callbacks.turn.lock().clone();
                    if let Some(cb) = turn_cb {
                        cb(TurnEvent {
                            text,
                            turn_complete,
                            interrupted,
                        })
                        .await;
                    }
                }
            }

            ServerMessage::ToolCall(payload) => {
                let invocations = payload.invocations();
                tracing::debug!(count = invocations.len(), "Received tool call batch");
                let cb = callbacks.tool_call.lock().clone();
                if let Some(cb) = cb {
                    // Awaited inline: the read loop does not pick up the next
                    // frame until this batch is fully handled.
                    cb(invocations).await;
                } else {
                    tracing::warn!("Tool call received with no handler registered");
                }
            }

            ServerMessage::ToolCallCancellation(payload) => {
                tracing::warn!(ids = ?payload.ids, "Tool call cancellation received");
            }
        }
    }

    /// Parse and dispatch one inbound frame.
    async fn handle_frame(
        payload: &[u8],
        callbacks: &Arc<CallbackSlots>,
        setup_waiter: &Arc<Mutex<Option<oneshot::Sender<()>>>>,
    ) {
        match serde_json::from_slice::<ServerMessage>(payload) {
            Ok(message) => Self::handle_server_message(message, callbacks, setup_waiter).await,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse server message: {} - {}",
                    e,
                    String::from_utf8_lossy(payload)
                );
            }
        }
    }
}

#[async_trait]
impl LiveTransport for GeminiLive {
    async fn connect(&mut self, config: LiveConfig) -> LiveResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let url = self.build_ws_url()?;

        self.intentional_disconnect.store(false, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Connecting;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| {
                *self.state.lock() = ConnectionState::Failed;
                LiveError::ConnectionFailed(e.to_string())
            })?;

        tracing::info!(model = %config.model, "Connected to Gemini Live API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<ClientMessage>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock() = Some(tx);

        let (setup_tx, setup_rx) = oneshot::channel::<()>();
        *self.setup_waiter.lock() = Some(setup_tx);

        let callbacks = self.callbacks.clone();
        let setup_waiter = self.setup_waiter.clone();
        let state = self.state.clone();
        let connected = self.connected.clone();
        let intentional_disconnect = self.intentional_disconnect.clone();
        let ws_sender = self.ws_sender.clone();

        let handle = tokio::spawn(async move {
            let mut close_code: Option<u16> = None;
            let mut close_reason: Option<String> = None;

            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        match outgoing {
                            Some(message) => {
                                let json = match serde_json::to_string(&message) {
                                    Ok(j) => j,
                                    Err(e) => {
                                        tracing::error!("Failed to serialize client message: {}", e);
                                        continue;
                                    }
                                };
                                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                    tracing::error!("Failed to send WebSocket message: {}", e);
                                    break;
                                }
                            }
                            // Sender dropped by a local disconnect.
                            None => break,
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                Self::handle_frame(text.as_bytes(), &callbacks, &setup_waiter).await;
                            }
                            // The Live API also delivers JSON payloads in
                            // binary frames.
                            Some(Ok(Message::Binary(data))) => {
                                Self::handle_frame(&data, &callbacks, &setup_waiter).await;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                if let Some(frame) = frame {
                                    close_code = Some(frame.code.into());
                                    close_reason = Some(frame.reason.to_string());
                                }
                                tracing::info!(
                                    code = ?close_code,
                                    reason = ?close_reason,
                                    "WebSocket closed by server"
                                );
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::error!("WebSocket error: {}", e);
                                let cb = callbacks.error.lock().clone();
                                if let Some(cb) = cb {
                                    cb(LiveError::WebSocketError(e.to_string())).await;
                                }
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            *state.lock() = ConnectionState::Disconnected;
            *ws_sender.lock() = None;

            let initiated_locally = intentional_disconnect.load(Ordering::SeqCst);
            let cb = callbacks.close.lock().clone();
            if let Some(cb) = cb {
                cb(CloseEvent {
                    initiated_locally,
                    code: close_code,
                    reason: close_reason,
                })
                .await;
            }
            tracing::info!(initiated_locally, "Gemini Live connection task ended");
        });

        *self.read_handle.lock() = Some(handle);

        // Negotiate the session and wait for the acknowledgment.
        let setup = ClientMessage::Setup(SetupPayload::from_config(&config));
        if let Err(e) = self.send_message(setup).await {
            self.teardown();
            *self.state.lock() = ConnectionState::Failed;
            return Err(e);
        }

        let setup_timeout = Duration::from_secs(GEMINI_SETUP_TIMEOUT_SECS);
        match tokio::time::timeout(setup_timeout, setup_rx).await {
            Ok(Ok(())) => {
                self.connected.store(true, Ordering::SeqCst);
                *self.state.lock() = ConnectionState::Connected;
                Ok(())
            }
            Ok(Err(_)) => {
                self.teardown();
                *self.state.lock() = ConnectionState::Failed;
                Err(LiveError::SetupRejected(
                    "connection closed before setup completed".to_string(),
                ))
            }
            Err(_) => {
                self.teardown();
                *self.state.lock() = ConnectionState::Failed;
                Err(LiveError::Timeout(format!(
                    "no setup acknowledgment within {}s",
                    GEMINI_SETUP_TIMEOUT_SECS
                )))
            }
        }
    }

    async fn disconnect(&mut self) {
        self.intentional_disconnect.store(true, Ordering::SeqCst);
        self.teardown();
        tracing::info!("Disconnected from Gemini Live API");
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn send_audio(&self, chunk: Bytes) -> LiveResult<()> {
        if !self.is_ready() {
            return Err(LiveError::NotConnected);
        }
        self.send_message(ClientMessage::RealtimeInput(RealtimeInputPayload {
            media_chunks: vec![MediaChunk::pcm_audio(&chunk)],
        }))
        .await
    }

    async fn send_text(&self, text: &str) -> LiveResult<()> {
        if !self.is_ready() {
            return Err(LiveError::NotConnected);
        }
        self.send_message(ClientMessage::ClientContent(ClientContentPayload {
            turns: vec![Content::user_text(text)],
            turn_complete: true,
        }))
        .await
    }

    async fn send_tool_response(&self, acks: Vec<ToolAck>) -> LiveResult<()> {
        if !self.is_ready() {
            return Err(LiveError::NotConnected);
        }
        self.send_message(ClientMessage::ToolResponse(acks.into()))
            .await
    }

    fn on_tool_call(&mut self, callback: ToolCallCallback) {
        *self.callbacks.tool_call.lock() = Some(callback);
    }

    fn off_tool_call(&mut self) {
        // Idempotent: clearing an empty slot is fine.
        *self.callbacks.tool_call.lock() = None;
    }

    fn on_audio(&mut self, callback: AudioOutputCallback) {
        *self.callbacks.audio.lock() = Some(callback);
    }

    fn on_turn(&mut self, callback: TurnCallback) {
        *self.callbacks.turn.lock() = Some(callback);
    }

    fn on_close(&mut self, callback: CloseCallback) {
        *self.callbacks.close.lock() = Some(callback);
    }

    fn on_error(&mut self, callback: LiveErrorCallback) {
        *self.callbacks.error.lock() = Some(callback);
    }
}

impl GeminiLive {
    /// Drop the connection task and reset connection state.
    fn teardown(&self) {
        *self.ws_sender.lock() = None;
        if let Some(handle) = self.read_handle.lock().take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Disconnected;
        *self.setup_waiter.lock() = None;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GeminiLive::new("test-key").unwrap();
        assert!(!client.is_ready());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_api_key_required() {
        let result = GeminiLive::new("");
        match result {
            Err(LiveError::AuthenticationFailed(_)) => {}
            _ => panic!("Expected AuthenticationFailed error"),
        }
    }

    #[test]
    fn test_build_ws_url() {
        let client = GeminiLive::new("secret").unwrap();
        let url = client.build_ws_url().unwrap();
        assert!(url.starts_with("wss://generativelanguage.googleapis.com"));
        assert!(url.ends_with("?key=secret"));
    }

    #[test]
    fn test_endpoint_override() {
        let client = GeminiLive::new("k")
            .unwrap()
            .with_endpoint("ws://127.0.0.1:9999/live");
        assert_eq!(
            client.build_ws_url().unwrap(),
            "ws://127.0.0.1:9999/live?key=k"
        );
    }

    #[test]
    fn test_unparseable_endpoint_is_rejected() {
        let client = GeminiLive::new("k").unwrap().with_endpoint("not a url");
        assert!(matches!(
            client.build_ws_url(),
            Err(LiveError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let client = GeminiLive::new("test-key").unwrap();

        let result = client.send_audio(Bytes::from(vec![0u8; 64])).await;
        assert!(matches!(result, Err(LiveError::NotConnected)));

        let result = client.send_text("hello").await;
        assert!(matches!(result, Err(LiveError::NotConnected)));

        let result = client.send_tool_response(vec![ToolAck::success("1")]).await;
        assert!(matches!(result, Err(LiveError::NotConnected)));
    }

    #[tokio::test]
    async fn test_off_tool_call_idempotent() {
        let mut client = GeminiLive::new("test-key").unwrap();
        client.off_tool_call();
        client.on_tool_call(Arc::new(|_| Box::pin(async {})));
        client.off_tool_call();
        client.off_tool_call();
        assert!(client.callbacks.tool_call.lock().is_none());
    }

    #[tokio::test]
    async fn test_setup_complete_resolves_waiter() {
        let client = GeminiLive::new("test-key").unwrap();
        let (tx, rx) = oneshot::channel();
        *client.setup_waiter.lock() = Some(tx);

        GeminiLive::handle_frame(
            br#"{ "setupComplete": {} }"#,
            &client.callbacks,
            &client.setup_waiter,
        )
        .await;

        assert!(rx.await.is_ok());
        assert!(client.setup_waiter.lock().is_none());
    }

    #[tokio::test]
    async fn test_tool_call_dispatched_to_callback() {
        let client = GeminiLive::new("test-key").unwrap();
        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        *client.callbacks.tool_call.lock() = Some(Arc::new(move |invocations| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock()
                    .extend(invocations.into_iter().map(|i| i.name));
            })
        }));

        GeminiLive::handle_frame(
            br#"{ "toolCall": { "functionCalls": [ { "id": "1", "name": "generate_feedback", "args": {} } ] } }"#,
            &client.callbacks,
            &client.setup_waiter,
        )
        .await;

        assert_eq!(received.lock().as_slice(), ["generate_feedback"]);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_swallowed() {
        let client = GeminiLive::new("test-key").unwrap();
        // Must not panic or error out of the read loop.
        GeminiLive::handle_frame(b"not json", &client.callbacks, &client.setup_waiter).await;
    }
}
