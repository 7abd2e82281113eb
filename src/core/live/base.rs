//! Base traits and types for live bidirectional conversation transports.
//!
//! A live transport owns one physical connection to a streaming
//! generative-AI backend and surfaces protocol events (tool calls, model
//! output, connection closure) through registered callbacks. The session
//! layer programs exclusively against [`LiveTransport`] so the state
//! machine can be exercised with a mock transport in tests.
//!
//! # Supported Backends
//!
//! - Gemini Live API (`BidiGenerateContent` over WebSocket)

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during live transport operations.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the backend failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The backend never acknowledged session setup
    #[error("Setup not acknowledged: {0}")]
    SetupRejected(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for live transport operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Response modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseModality {
    /// Spoken audio output (default)
    #[default]
    Audio,
    /// Text output only
    Text,
}

impl ResponseModality {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ResponseModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tool the model may invoke during the session.
///
/// `parameters` is a recursive JSON schema in the backend's schema dialect
/// (object/array/string/number shapes with required fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Tool name, unique within one config
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// JSON schema for the tool arguments
    pub parameters: serde_json::Value,
}

/// Configuration for one live session.
///
/// Immutable once handed to [`LiveTransport::connect`]; a new session start
/// always rebuilds a fresh value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Model identifier (e.g. "models/gemini-2.0-flash-live-001")
    pub model: String,
    /// Requested response modality
    pub response_modality: ResponseModality,
    /// System instruction text
    pub system_instruction: String,
    /// Declared tools, in declaration order
    pub tools: Vec<ToolDeclaration>,
}

impl LiveConfig {
    /// Names of all declared tools, in declaration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }
}

// =============================================================================
// Protocol Event Types
// =============================================================================

/// One tool invocation from the model.
///
/// Ephemeral: exists only for the duration of one event-handling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Opaque transport-assigned invocation id
    pub id: String,
    /// Tool name the model is invoking
    pub name: String,
    /// Structured arguments
    pub args: serde_json::Value,
}

/// Acknowledgment for one tool invocation id.
///
/// The wire contract requires one response per invocation id, matched or
/// not, with a fixed output shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAck {
    /// The invocation id being acknowledged
    pub id: String,
    /// Response payload
    pub response: serde_json::Value,
}

impl ToolAck {
    /// The fixed success acknowledgment for an invocation id.
    pub fn success(id: &str) -> Self {
        Self {
            id: id.to_string(),
            response: serde_json::json!({ "output": { "success": true } }),
        }
    }
}

/// Audio output from the model.
#[derive(Debug, Clone)]
pub struct LiveAudioData {
    /// Raw audio bytes (PCM 16-bit signed little-endian, mono)
    pub data: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// A model turn update (text content and/or turn boundary markers).
#[derive(Debug, Clone, Default)]
pub struct TurnEvent {
    /// Text content of the turn, when present
    pub text: Option<String>,
    /// The model finished its turn
    pub turn_complete: bool,
    /// The model was interrupted mid-turn
    pub interrupted: bool,
}

/// Connection closure details.
///
/// `initiated_locally` distinguishes a close caused by the local
/// [`LiveTransport::disconnect`] call from one imposed by the remote side.
/// The session layer relies on this to keep user-initiated and
/// server-initiated disconnects apart.
#[derive(Debug, Clone)]
pub struct CloseEvent {
    /// True when the local side requested the close
    pub initiated_locally: bool,
    /// Close code, when the remote supplied one
    pub code: Option<u16>,
    /// Close reason, when the remote supplied one
    pub reason: Option<String>,
}

// =============================================================================
// Connection State
// =============================================================================

/// Physical connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Callback type for tool-call batches.
///
/// The transport awaits the callback inline from its read loop, so two
/// batches are never handled concurrently.
pub type ToolCallCallback =
    Arc<dyn Fn(Vec<ToolInvocation>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for model audio output.
pub type AudioOutputCallback =
    Arc<dyn Fn(LiveAudioData) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for model turn updates.
pub type TurnCallback =
    Arc<dyn Fn(TurnEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for connection closure.
pub type CloseCallback =
    Arc<dyn Fn(CloseEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for transport errors.
pub type LiveErrorCallback =
    Arc<dyn Fn(LiveError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for live bidirectional conversation transports.
///
/// Registration replaces the existing callback in that slot, so
/// re-registering across reconnects never leaks handlers; clearing an
/// already-empty slot is a no-op.
///
/// There is deliberately no automatic reconnection here: a lost connection
/// surfaces through the close callback with `initiated_locally == false`,
/// and re-establishing a session is an explicit decision of the session
/// layer.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Open the connection and negotiate a session with `config`.
    ///
    /// The config is consumed whole; it cannot be amended mid-session.
    async fn connect(&mut self, config: LiveConfig) -> LiveResult<()>;

    /// Tear the connection down. Never fails; idempotent.
    async fn disconnect(&mut self);

    /// Whether the transport is connected and ready.
    fn is_ready(&self) -> bool;

    /// Current physical connection state.
    fn connection_state(&self) -> ConnectionState;

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    /// Send one chunk of input audio (PCM 16-bit mono).
    async fn send_audio(&self, chunk: Bytes) -> LiveResult<()>;

    /// Send a user text turn.
    async fn send_text(&self, text: &str) -> LiveResult<()>;

    /// Send acknowledgments for received tool invocations.
    async fn send_tool_response(&self, acks: Vec<ToolAck>) -> LiveResult<()>;

    // -------------------------------------------------------------------------
    // Callbacks
    // -------------------------------------------------------------------------

    /// Register the tool-call handler (replaces any existing one).
    fn on_tool_call(&mut self, callback: ToolCallCallback);

    /// Clear the tool-call handler. Safe to call when none is registered.
    fn off_tool_call(&mut self);

    /// Register a callback for model audio output.
    fn on_audio(&mut self, callback: AudioOutputCallback);

    /// Register a callback for model turn updates.
    fn on_turn(&mut self, callback: TurnCallback);

    /// Register a callback for connection closure.
    fn on_close(&mut self, callback: CloseCallback);

    /// Register a callback for transport errors.
    fn on_error(&mut self, callback: LiveErrorCallback);
}

/// Boxed trait object for live transports.
pub type BoxedLiveTransport = Box<dyn LiveTransport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
    }

    #[test]
    fn test_response_modality_as_str() {
        assert_eq!(ResponseModality::Audio.as_str(), "audio");
        assert_eq!(ResponseModality::Text.as_str(), "text");
        assert_eq!(ResponseModality::default(), ResponseModality::Audio);
    }

    #[test]
    fn test_tool_ack_success_shape() {
        let ack = ToolAck::success("call-7");
        assert_eq!(ack.id, "call-7");
        assert_eq!(ack.response["output"]["success"], serde_json::json!(true));
    }

    #[test]
    fn test_tool_names_in_declaration_order() {
        let config = LiveConfig {
            model: "models/test".to_string(),
            response_modality: ResponseModality::Audio,
            system_instruction: String::new(),
            tools: vec![
                ToolDeclaration {
                    name: "alpha".to_string(),
                    description: String::new(),
                    parameters: serde_json::json!({}),
                },
                ToolDeclaration {
                    name: "beta".to_string(),
                    description: String::new(),
                    parameters: serde_json::json!({}),
                },
            ],
        };
        assert_eq!(config.tool_names(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_error_display() {
        let err = LiveError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = LiveError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }
}
