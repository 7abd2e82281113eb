//! Gemini Live API transport.
//!
//! WebSocket client for the `BidiGenerateContent` API: session setup
//! negotiation, realtime media input, model output streaming, and the
//! tool-call / tool-response protocol.

pub mod client;
pub mod config;
pub mod messages;

pub use client::GeminiLive;
pub use config::{
    GEMINI_AUDIO_INPUT_MIME, GEMINI_INPUT_SAMPLE_RATE, GEMINI_LIVE_URL,
    GEMINI_OUTPUT_SAMPLE_RATE, GEMINI_SETUP_TIMEOUT_SECS, GeminiLiveModel,
};
