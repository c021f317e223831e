//! Token backend for realtime transcription sessions.
//!
//! Holds the long-lived OpenAI API key and mints short-lived session
//! credentials so clients never see the real key. One endpoint, one
//! upstream call per session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";
const SESSION_MODEL: &str = "gpt-4o-mini-realtime-preview-2024-12-17";
const INSTRUCTIONS: &str = "Transcribe English speech EXACTLY as you hear it. Do NOT add words, \
    explanations, or rewrite anything. Only output the spoken English text.";

struct AppState {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .context("invalid PORT")?;
    let api_key = std::env::var("OPENAI_API_KEY").ok();
    if api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; token requests will fail");
    }

    let state = Arc::new(AppState {
        client: reqwest::Client::new(),
        api_key,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/realtime-token", post(mint_token))
        .with_state(state);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    tracing::info!(%addr, "token server listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": now_ms(),
        "openaiConfigured": state.api_key.is_some(),
    }))
}

/// Mint an ephemeral session credential for one realtime connection.
async fn mint_token(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(api_key) = state.api_key.as_deref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "OpenAI API key not configured"})),
        );
    };

    let body = json!({
        "model": SESSION_MODEL,
        "voice": "alloy",
        "modalities": ["audio", "text"],
        "instructions": INSTRUCTIONS,
        "temperature": 0.6,
    });

    let response = match state
        .client
        .post(SESSIONS_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "realtime session request failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate Realtime session token",
                    "message": e.to_string(),
                })),
            );
        }
    };

    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        tracing::error!(%status, %details, "realtime session creation rejected");
        return (
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            Json(json!({
                "error": format!("Failed to create Realtime session: {}", status.as_u16()),
                "details": details,
            })),
        );
    }

    let session: Value = match response.json().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "invalid session payload");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": "Invalid response from Realtime API"})),
            );
        }
    };

    tracing::info!(session_id = ?session["id"].as_str(), "realtime session created");
    (
        StatusCode::OK,
        Json(json!({
            "sessionId": session["id"],
            "clientSecret": client_secret(&session),
            "expiresAt": expires_at(&session),
        })),
    )
}

/// The client secret may be a bare string or an object with a `value`.
fn client_secret(session: &Value) -> Value {
    match &session["client_secret"] {
        Value::Object(secret) => secret.get("value").cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn expires_at(session: &Value) -> Value {
    session["expires_at"]
        .as_i64()
        .or_else(|| session["client_secret"]["expires_at"].as_i64())
        .map(Value::from)
        .unwrap_or_else(|| Value::from(now_ms() + 60_000))
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
