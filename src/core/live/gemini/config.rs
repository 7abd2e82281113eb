//! Gemini Live API configuration types.
//!
//! Endpoint constants, the supported model catalog, and audio format
//! parameters for the `BidiGenerateContent` WebSocket API.

use serde::{Deserialize, Serialize};

/// Gemini Live API WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Sample rate of input audio sent to the model (Hz).
pub const GEMINI_INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of audio produced by the model (Hz).
pub const GEMINI_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// MIME type for input audio chunks.
pub const GEMINI_AUDIO_INPUT_MIME: &str = "audio/pcm;rate=16000";

/// How long to wait for the server's setup acknowledgment before the
/// connection attempt is treated as failed.
pub const GEMINI_SETUP_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Models
// =============================================================================

/// Supported Gemini Live models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeminiLiveModel {
    /// Gemini 2.5 Flash with native audio (latest)
    #[default]
    #[serde(rename = "models/gemini-2.5-flash-native-audio-latest")]
    Flash25NativeAudio,
    /// Gemini 2.0 Flash Live
    #[serde(rename = "models/gemini-2.0-flash-live-001")]
    Flash20Live,
    /// Gemini 2.0 Flash (experimental)
    #[serde(rename = "models/gemini-2.0-flash-exp")]
    Flash20Exp,
}

impl GeminiLiveModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash25NativeAudio => "models/gemini-2.5-flash-native-audio-latest",
            Self::Flash20Live => "models/gemini-2.0-flash-live-001",
            Self::Flash20Exp => "models/gemini-2.0-flash-exp",
        }
    }

    /// Parse from string, with fallback to default. Accepts identifiers
    /// with or without the "models/" prefix.
    pub fn from_str_or_default(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        let name = normalized.strip_prefix("models/").unwrap_or(&normalized);
        match name {
            "gemini-2.5-flash-native-audio-latest" => Self::Flash25NativeAudio,
            "gemini-2.0-flash-live-001" => Self::Flash20Live,
            "gemini-2.0-flash-exp" => Self::Flash20Exp,
            _ => Self::default(),
        }
    }

    /// Get all supported models.
    pub fn all() -> &'static [GeminiLiveModel] {
        &[
            Self::Flash25NativeAudio,
            Self::Flash20Live,
            Self::Flash20Exp,
        ]
    }
}

impl std::fmt::Display for GeminiLiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_as_str() {
        assert_eq!(
            GeminiLiveModel::Flash20Exp.as_str(),
            "models/gemini-2.0-flash-exp"
        );
        assert_eq!(
            GeminiLiveModel::Flash25NativeAudio.as_str(),
            "models/gemini-2.5-flash-native-audio-latest"
        );
    }

    #[test]
    fn test_model_from_str() {
        assert_eq!(
            GeminiLiveModel::from_str_or_default("models/gemini-2.0-flash-live-001"),
            GeminiLiveModel::Flash20Live
        );
        assert_eq!(
            GeminiLiveModel::from_str_or_default("gemini-2.0-flash-exp"),
            GeminiLiveModel::Flash20Exp
        );
        assert_eq!(
            GeminiLiveModel::from_str_or_default("unknown"),
            GeminiLiveModel::Flash25NativeAudio
        );
    }

    #[test]
    fn test_model_all() {
        let models = GeminiLiveModel::all();
        assert_eq!(models.len(), 3);
        assert!(models.contains(&GeminiLiveModel::Flash20Live));
    }

    #[test]
    fn test_sample_rates() {
        assert_eq!(GEMINI_INPUT_SAMPLE_RATE, 16000);
        assert_eq!(GEMINI_OUTPUT_SAMPLE_RATE, 24000);
        assert!(GEMINI_AUDIO_INPUT_MIME.contains("16000"));
    }
}
