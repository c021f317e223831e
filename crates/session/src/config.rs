use livecap_protocol::{
    SessionUpdate, TurnDetection, DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL,
};

/// Configuration for one realtime transcription session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Token backend base URL (exposes `POST /api/realtime-token`).
    pub backend_url: String,
    /// Realtime session model, passed in the socket URL.
    pub realtime_model: String,
    /// Transcription model for STT-only mode.
    pub transcription_model: String,
    /// Server-side voice activity detection tuning.
    pub turn_detection: TurnDetection,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:3000".into(),
            realtime_model: DEFAULT_REALTIME_MODEL.into(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.into(),
            turn_detection: TurnDetection::default(),
        }
    }
}

impl SessionConfig {
    /// The `session.update` payload sent once after connecting.
    pub fn session_update(&self) -> SessionUpdate {
        SessionUpdate::transcription_only(&self.transcription_model, self.turn_detection.clone())
    }
}
