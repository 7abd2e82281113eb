//! Live bidirectional conversation transport.
//!
//! This module provides the abstraction and implementation for a
//! persistent streaming connection to a generative-AI backend:
//! - [`LiveTransport`] trait for transport abstraction
//! - [`GeminiLive`] client for the Gemini Live API
//! - Callback-based event handling (tool calls, audio, turns, closure)
//!
//! The session layer (`crate::session`) owns all conversational state; a
//! transport holds nothing beyond the physical connection.

mod base;
pub mod gemini;

pub use base::{
    AudioOutputCallback, BoxedLiveTransport, CloseCallback, CloseEvent, ConnectionState,
    LiveAudioData, LiveConfig, LiveError, LiveErrorCallback, LiveResult, LiveTransport,
    ResponseModality, ToolAck, ToolCallCallback, ToolDeclaration, ToolInvocation, TurnCallback,
    TurnEvent,
};
pub use gemini::{GeminiLive, GeminiLiveModel};
