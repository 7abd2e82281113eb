//! Browser-facing WebSocket message types.
//!
//! JSON messages are `type`-tagged; audio travels as raw binary frames in
//! both directions (PCM 16-bit mono: 16kHz toward the model, 24kHz back).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::live::GeminiLiveModel;
use crate::session::{SessionContext, SessionProfile};

/// Maximum allowed size for resume text (200 KB)
pub const MAX_RESUME_SIZE: usize = 200 * 1024;

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveIncomingMessage {
    /// Start the session
    Start(SessionRequest),
    /// Stop the session (user-initiated)
    Disconnect,
    /// Re-establish the session after a disconnect
    Reconnect(SessionRequest),
    /// Send a user text turn
    Text {
        /// Text content
        text: String,
    },
    /// Reset a completed session back to idle
    Reset,
}

/// Session parameters supplied by the client.
///
/// All fields optional: the server falls back to its configured defaults,
/// and a reconnect merges these over the values from the original start.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionRequest {
    /// Candidate resume text
    #[serde(default)]
    pub resume_text: Option<String>,
    /// Model identifier
    #[serde(default)]
    pub model: Option<String>,
    /// Assistant profile ("interview", "dsa", "shopping")
    #[serde(default)]
    pub profile: Option<String>,
}

impl SessionRequest {
    /// Resolve into a session context using `default_model` for anything
    /// the client left out.
    pub fn to_context(&self, default_model: GeminiLiveModel) -> SessionContext {
        SessionContext {
            profile: self
                .profile
                .as_deref()
                .and_then(SessionProfile::parse)
                .unwrap_or_default(),
            resume_text: self.resume_text.clone().unwrap_or_default(),
            model: self
                .model
                .as_deref()
                .map(GeminiLiveModel::from_str_or_default)
                .unwrap_or(default_model),
        }
    }

    /// Overlay `update` on top of this request; absent fields keep their
    /// previous values.
    pub fn merged_with(&self, update: &SessionRequest) -> SessionRequest {
        SessionRequest {
            resume_text: update.resume_text.clone().or_else(|| self.resume_text.clone()),
            model: update.model.clone().or_else(|| self.model.clone()),
            profile: update.profile.clone().or_else(|| self.profile.clone()),
        }
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveOutgoingMessage {
    /// Session phase changed
    SessionState {
        /// Phase name
        phase: String,
        /// Disconnect origin ("local" or "remote"), only when disconnected.
        /// A remote origin renders as "the server ended the session", a
        /// local one as "you chose to stop".
        #[serde(skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },

    /// The final scorecard. A recovered stranded result is delivered the
    /// same way as a live one, flagged only for logging/UX copy.
    Feedback {
        /// Scorecard payload
        report: Value,
        /// True when recovered from the durable slot at session start
        recovered: bool,
    },

    /// Model turn update
    Turn {
        /// Turn text, when the model produced any
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// The model finished its turn
        turn_complete: bool,
        /// The model was interrupted
        interrupted: bool,
    },

    /// Error message
    Error {
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Error message
        message: String,
    },
}

// =============================================================================
// Message Routing
// =============================================================================

/// Routing of outbound frames.
pub enum LiveMessageRoute {
    /// JSON text message
    Outgoing(LiveOutgoingMessage),
    /// Binary audio data
    Audio(Bytes),
    /// Close the connection
    Close,
}

// =============================================================================
// Validation
// =============================================================================

/// Message validation failures.
#[derive(Debug, Clone)]
pub enum LiveValidationError {
    /// Resume text exceeds the maximum allowed size
    ResumeTooLarge {
        /// Actual size
        size: usize,
        /// Allowed maximum
        max: usize,
    },
    /// Text content exceeds the maximum allowed size
    TextTooLarge {
        /// Actual size
        size: usize,
        /// Allowed maximum
        max: usize,
    },
}

impl std::fmt::Display for LiveValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResumeTooLarge { size, max } => {
                write!(f, "Resume too large: {} bytes (max: {} bytes)", size, max)
            }
            Self::TextTooLarge { size, max } => {
                write!(f, "Text too large: {} bytes (max: {} bytes)", size, max)
            }
        }
    }
}

impl std::error::Error for LiveValidationError {}

impl LiveIncomingMessage {
    /// Validate user-supplied field sizes.
    pub fn validate_size(&self) -> Result<(), LiveValidationError> {
        match self {
            LiveIncomingMessage::Start(request) | LiveIncomingMessage::Reconnect(request) => {
                if let Some(resume) = &request.resume_text {
                    let size = resume.len();
                    if size > MAX_RESUME_SIZE {
                        return Err(LiveValidationError::ResumeTooLarge {
                            size,
                            max: MAX_RESUME_SIZE,
                        });
                    }
                }
            }
            LiveIncomingMessage::Text { text } => {
                let size = text.len();
                if size > MAX_TEXT_SIZE {
                    return Err(LiveValidationError::TextTooLarge {
                        size,
                        max: MAX_TEXT_SIZE,
                    });
                }
            }
            LiveIncomingMessage::Disconnect | LiveIncomingMessage::Reset => {}
        }
        Ok(())
    }
}
