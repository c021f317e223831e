//! Realtime transcription session.
//!
//! Owns one capture-to-caption pipeline: exchanges the backend token for a
//! session credential, connects the realtime socket, and runs a single
//! event loop that converts audio frames into paced protocol messages and
//! server events into caption updates.

mod config;
mod session;
mod timers;
mod token;

pub use config::SessionConfig;
pub use session::{RealtimeSession, DEBOUNCE_DELAY, FINAL_DISPLAY_TIME};
pub use timers::DelaySlot;
pub use token::fetch_token;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("token exchange failed: {0}")]
    Token(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
