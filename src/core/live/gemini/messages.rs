//! Gemini Live API WebSocket message types.
//!
//! The `BidiGenerateContent` protocol exchanges single-key JSON objects in
//! both directions; the key names the message kind (camelCase).
//!
//! Client messages (sent to server):
//! - setup - Negotiate the session (model, modality, instruction, tools)
//! - realtimeInput - Stream input media chunks
//! - clientContent - Add a user turn to the conversation
//! - toolResponse - Acknowledge tool invocations
//!
//! Server messages (received from server):
//! - setupComplete - Session setup acknowledged
//! - serverContent - Model turn content (audio/text) and turn markers
//! - toolCall - A batch of function invocations
//! - toolCallCancellation - Previously issued invocations were withdrawn

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::live::base::{LiveConfig, ToolAck, ToolInvocation};

use super::config::GEMINI_AUDIO_INPUT_MIME;

// =============================================================================
// Shared Content Types
// =============================================================================

/// A block of content made of one or more parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// Content role (user, model), absent for system instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A single text part with no role (system instruction shape).
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }

    /// A single-part user turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            ..Self::text(text)
        }
    }
}

/// One part of a content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary content (base64)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

/// Base64-encoded inline media.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type, e.g. "audio/pcm;rate=24000"
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// Client messages sent to the Gemini Live API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Negotiate the session
    Setup(SetupPayload),
    /// Stream input media
    RealtimeInput(RealtimeInputPayload),
    /// Add a turn to the conversation
    ClientContent(ClientContentPayload),
    /// Acknowledge tool invocations
    ToolResponse(ToolResponsePayload),
}

/// Session setup payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    /// Model identifier
    pub model: String,
    /// Generation configuration
    pub generation_config: GenerationConfig,
    /// System instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Declared tools
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolWrapper>,
}

impl SetupPayload {
    /// Build the wire setup payload from a session config.
    pub fn from_config(config: &LiveConfig) -> Self {
        let tools = if config.tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolWrapper {
                function_declarations: config
                    .tools
                    .iter()
                    .map(|t| FunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    })
                    .collect(),
            }]
        };

        Self {
            model: config.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: config.response_modality.as_str().to_string(),
            },
            system_instruction: Some(Content::text(config.system_instruction.clone())),
            tools,
        }
    }
}

/// Generation configuration for the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Response modality ("audio" or "text")
    pub response_modalities: String,
}

/// Wrapper holding function declarations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolWrapper {
    /// Declared functions
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// One declared function.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    /// Function name
    pub name: String,
    /// Function description
    pub description: String,
    /// JSON schema for arguments
    pub parameters: serde_json::Value,
}

/// Streaming input payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputPayload {
    /// Media chunks in arrival order
    pub media_chunks: Vec<MediaChunk>,
}

/// One base64-encoded media chunk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    /// MIME type of the chunk
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

impl MediaChunk {
    /// Encode a PCM 16-bit/16kHz audio chunk.
    pub fn pcm_audio(data: &[u8]) -> Self {
        Self {
            mime_type: GEMINI_AUDIO_INPUT_MIME.to_string(),
            data: BASE64_STANDARD.encode(data),
        }
    }
}

/// Conversation turn payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContentPayload {
    /// Turns to append
    pub turns: Vec<Content>,
    /// Whether the client turn is complete
    pub turn_complete: bool,
}

/// Tool acknowledgment payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponsePayload {
    /// One response per received invocation id
    pub function_responses: Vec<FunctionResponse>,
}

impl From<Vec<ToolAck>> for ToolResponsePayload {
    fn from(acks: Vec<ToolAck>) -> Self {
        Self {
            function_responses: acks
                .into_iter()
                .map(|a| FunctionResponse {
                    response: a.response,
                    id: a.id,
                })
                .collect(),
        }
    }
}

/// One function response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    /// Response payload
    pub response: serde_json::Value,
    /// Invocation id being answered
    pub id: String,
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// Server messages received from the Gemini Live API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    /// Session setup acknowledged
    SetupComplete(SetupCompletePayload),
    /// Model turn content
    ServerContent(ServerContentPayload),
    /// Tool invocation batch
    ToolCall(ToolCallPayload),
    /// Previously issued invocations withdrawn
    ToolCallCancellation(ToolCallCancellationPayload),
}

/// Empty setup acknowledgment body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupCompletePayload {}

/// Model turn content and turn boundary markers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContentPayload {
    /// Content produced by the model this turn
    #[serde(default)]
    pub model_turn: Option<Content>,
    /// The model finished its turn
    #[serde(default)]
    pub turn_complete: Option<bool>,
    /// Generation was interrupted (e.g. by user speech)
    #[serde(default)]
    pub interrupted: Option<bool>,
}

impl ServerContentPayload {
    /// Decode all inline audio parts of the model turn.
    pub fn audio_chunks(&self) -> Vec<Bytes> {
        let Some(turn) = &self.model_turn else {
            return Vec::new();
        };
        turn.parts
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .filter(|d| d.mime_type.starts_with("audio/"))
            .filter_map(|d| match BASE64_STANDARD.decode(&d.data) {
                Ok(bytes) => Some(Bytes::from(bytes)),
                Err(e) => {
                    tracing::error!("Failed to decode audio part: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Concatenated text parts of the model turn, if any.
    pub fn text(&self) -> Option<String> {
        let turn = self.model_turn.as_ref()?;
        let text: String = turn
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Tool invocation batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    /// Invocations in the batch, in protocol order
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

impl ToolCallPayload {
    /// Convert wire invocations into the transport-neutral shape.
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.function_calls
            .iter()
            .map(|fc| ToolInvocation {
                id: fc.id.clone(),
                name: fc.name.clone(),
                args: fc.args.clone(),
            })
            .collect()
    }
}

/// One function invocation from the model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    /// Transport-assigned invocation id
    pub id: String,
    /// Invoked function name
    pub name: String,
    /// Structured arguments
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Withdrawn invocation ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallCancellationPayload {
    /// Ids of invocations the model no longer expects answered
    #[serde(default)]
    pub ids: Vec<String>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::live::base::{ResponseModality, ToolDeclaration};

    fn sample_config() -> LiveConfig {
        LiveConfig {
            model: "models/gemini-2.0-flash-exp".to_string(),
            response_modality: ResponseModality::Audio,
            system_instruction: "Be brief.".to_string(),
            tools: vec![ToolDeclaration {
                name: "generate_feedback".to_string(),
                description: "Emit feedback".to_string(),
                parameters: serde_json::json!({ "type": "OBJECT" }),
            }],
        }
    }

    #[test]
    fn test_setup_serialization() {
        let msg = ClientMessage::Setup(SetupPayload::from_config(&sample_config()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["setup"]["model"], "models/gemini-2.0-flash-exp");
        assert_eq!(
            json["setup"]["generationConfig"]["responseModalities"],
            "audio"
        );
        assert_eq!(
            json["setup"]["systemInstruction"]["parts"][0]["text"],
            "Be brief."
        );
        assert_eq!(
            json["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "generate_feedback"
        );
    }

    #[test]
    fn test_setup_without_tools_omits_field() {
        let mut config = sample_config();
        config.tools.clear();
        let json =
            serde_json::to_value(ClientMessage::Setup(SetupPayload::from_config(&config))).unwrap();
        assert!(json["setup"].get("tools").is_none());
    }

    #[test]
    fn test_realtime_input_round_trip() {
        let data = vec![0u8, 1, 2, 3];
        let chunk = MediaChunk::pcm_audio(&data);
        assert_eq!(chunk.mime_type, GEMINI_AUDIO_INPUT_MIME);
        assert_eq!(BASE64_STANDARD.decode(&chunk.data).unwrap(), data);

        let msg = ClientMessage::RealtimeInput(RealtimeInputPayload {
            media_chunks: vec![chunk],
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("realtimeInput"));
        assert!(json.contains("mediaChunks"));
    }

    #[test]
    fn test_tool_response_serialization() {
        let payload: ToolResponsePayload = vec![ToolAck::success("1"), ToolAck::success("2")].into();
        let json = serde_json::to_value(ClientMessage::ToolResponse(payload)).unwrap();
        let responses = json["toolResponse"]["functionResponses"].as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], "1");
        assert_eq!(responses[0]["response"]["output"]["success"], true);
    }

    #[test]
    fn test_tool_call_deserialization() {
        let json = r#"{
            "toolCall": {
                "functionCalls": [
                    { "id": "call-1", "name": "generate_feedback", "args": { "score": 80 } }
                ]
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::ToolCall(payload) => {
                let invocations = payload.invocations();
                assert_eq!(invocations.len(), 1);
                assert_eq!(invocations[0].id, "call-1");
                assert_eq!(invocations[0].name, "generate_feedback");
                assert_eq!(invocations[0].args["score"], 80);
            }
            _ => panic!("Expected ToolCall variant"),
        }
    }

    #[test]
    fn test_setup_complete_deserialization() {
        let msg: ServerMessage = serde_json::from_str(r#"{ "setupComplete": {} }"#).unwrap();
        assert!(matches!(msg, ServerMessage::SetupComplete(_)));
    }

    #[test]
    fn test_server_content_audio_and_text() {
        let audio = BASE64_STANDARD.encode([5u8, 6, 7]);
        let json = format!(
            r#"{{
                "serverContent": {{
                    "modelTurn": {{
                        "parts": [
                            {{ "text": "hello " }},
                            {{ "text": "there" }},
                            {{ "inlineData": {{ "mimeType": "audio/pcm;rate=24000", "data": "{audio}" }} }}
                        ]
                    }},
                    "turnComplete": true
                }}
            }}"#
        );
        let msg: ServerMessage = serde_json::from_str(&json).unwrap();
        match msg {
            ServerMessage::ServerContent(content) => {
                assert_eq!(content.text().as_deref(), Some("hello there"));
                let chunks = content.audio_chunks();
                assert_eq!(chunks.len(), 1);
                assert_eq!(chunks[0].as_ref(), &[5u8, 6, 7]);
                assert_eq!(content.turn_complete, Some(true));
            }
            _ => panic!("Expected ServerContent variant"),
        }
    }

    #[test]
    fn test_tool_call_cancellation_deserialization() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{ "toolCallCancellation": { "ids": ["a", "b"] } }"#).unwrap();
        match msg {
            ServerMessage::ToolCallCancellation(payload) => {
                assert_eq!(payload.ids, vec!["a", "b"]);
            }
            _ => panic!("Expected ToolCallCancellation variant"),
        }
    }

    #[test]
    fn test_client_content_serialization() {
        let msg = ClientMessage::ClientContent(ClientContentPayload {
            turns: vec![Content::user_text("start interview")],
            turn_complete: true,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["clientContent"]["turnComplete"], true);
        assert_eq!(json["clientContent"]["turns"][0]["role"], "user");
    }
}
