//! Wire contracts for the OpenAI Realtime transcription API.
//!
//! Defines the JSON-framed messages exchanged over the realtime socket and
//! the token DTO returned by the backend. Using shared typed events keeps
//! serialization mismatches out of the session loop.

use serde::{Deserialize, Serialize};

/// Realtime API WebSocket endpoint (model is passed as a query parameter).
pub const REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime session model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-mini-realtime-preview-2024-12-17";

/// Default transcription model for STT-only sessions.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-mini-transcribe";

/// Instructions pinning the session to verbatim transcription.
pub const TRANSCRIPTION_INSTRUCTIONS: &str = "Transcribe English speech EXACTLY as you hear it. \
    Do NOT add words, explanations, or rewrite anything. Only output the spoken English text.";

/// Error code the service returns when a commit finds an empty buffer.
/// Expected during silence; not a real error.
pub const COMMIT_EMPTY_CODE: &str = "input_audio_buffer_commit_empty";

/// Messages sent to the realtime service.
///
/// Producers: session loop
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Session configuration, sent once after the socket opens.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },
    /// One base64-encoded PCM chunk.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    /// Ask the service to finalize the buffered audio.
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
}

/// `session.update` payload for a transcription-only session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdate {
    pub modalities: Vec<String>,
    pub instructions: String,
    /// Unused in STT-only mode but required by the API.
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: TranscriptionConfig,
    pub turn_detection: TurnDetection,
    pub temperature: f32,
}

impl SessionUpdate {
    /// Transcription-only session with 16-bit PCM in and out.
    pub fn transcription_only(transcription_model: &str, turn_detection: TurnDetection) -> Self {
        Self {
            modalities: vec!["audio".into(), "text".into()],
            instructions: TRANSCRIPTION_INSTRUCTIONS.into(),
            voice: "alloy".into(),
            input_audio_format: "pcm16".into(),
            output_audio_format: "pcm16".into(),
            input_audio_transcription: TranscriptionConfig {
                model: transcription_model.into(),
            },
            turn_detection,
            temperature: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub model: String,
}

/// Server-side voice activity detection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    /// Detection sensitivity; lower detects speech faster.
    pub threshold: f32,
    /// Audio retained before the detected speech start.
    pub prefix_padding_ms: u32,
    /// Silence required before speech is considered stopped.
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad".into(),
            threshold: 0.3,
            prefix_padding_ms: 200,
            silence_duration_ms: 160,
        }
    }
}

/// Events received from the realtime service.
///
/// Only the types the pipeline reacts to are modeled; everything else
/// deserializes to `Unknown` and is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,
    /// Partial transcription text for the active segment.
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    TranscriptionDelta {
        #[serde(default)]
        delta: String,
    },
    /// Model-finalized transcript for the segment.
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },
    #[serde(rename = "error")]
    Error { error: ApiError },
    #[serde(other)]
    Unknown,
}

/// Error payload carried by an `error` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl ApiError {
    /// True for the benign empty-buffer commit rejection.
    pub fn is_commit_empty(&self) -> bool {
        self.code.as_deref() == Some(COMMIT_EMPTY_CODE)
    }
}

/// Ephemeral session credential returned by the token backend.
///
/// Producers: token-server
/// Consumers: session connect
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub client_secret: String,
    pub session_id: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_serializes_with_type_tag() {
        let event = ClientEvent::InputAudioBufferAppend {
            audio: "AAAA".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "input_audio_buffer.append", "audio": "AAAA"})
        );
    }

    #[test]
    fn test_commit_serializes_to_bare_type() {
        let value = serde_json::to_value(&ClientEvent::InputAudioBufferCommit).unwrap();
        assert_eq!(value, json!({"type": "input_audio_buffer.commit"}));
    }

    #[test]
    fn test_session_update_shape() {
        let event = ClientEvent::SessionUpdate {
            session: SessionUpdate::transcription_only(
                DEFAULT_TRANSCRIPTION_MODEL,
                TurnDetection::default(),
            ),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["input_audio_format"], "pcm16");
        assert_eq!(
            value["session"]["input_audio_transcription"]["model"],
            DEFAULT_TRANSCRIPTION_MODEL
        );
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(value["session"]["turn_detection"]["silence_duration_ms"], 160);
    }

    #[test]
    fn test_delta_deserialize() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.input_audio_transcription.delta","delta":"hello "}"#,
        )
        .unwrap();
        assert!(matches!(event, ServerEvent::TranscriptionDelta { delta } if delta == "hello "));
    }

    #[test]
    fn test_delta_missing_field_defaults_empty() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.input_audio_transcription.delta"}"#,
        )
        .unwrap();
        assert!(matches!(event, ServerEvent::TranscriptionDelta { delta } if delta.is_empty()));
    }

    #[test]
    fn test_speech_events_tolerate_extra_fields() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":120,"item_id":"x"}"#,
        )
        .unwrap();
        assert!(matches!(event, ServerEvent::SpeechStarted));
    }

    #[test]
    fn test_error_event_commit_empty() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"invalid_request_error","code":"input_audio_buffer_commit_empty","message":"buffer too small"}}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Error { error } => assert!(error.is_commit_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_type_is_unknown() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"response.audio.done","response_id":"r1"}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn test_token_response_camel_case() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"clientSecret":"ek_abc","sessionId":"sess_1","expiresAt":1735689600}"#,
        )
        .unwrap();
        assert_eq!(token.client_secret, "ek_abc");
        assert_eq!(token.session_id, "sess_1");
        assert_eq!(token.expires_at, Some(1735689600));
    }
}
