use livecap_protocol::TokenResponse;

use crate::{Result, SessionError};

/// Exchange the backend's long-lived credential for an ephemeral session
/// token. One call per session; the caller re-initiates on failure.
pub async fn fetch_token(client: &reqwest::Client, backend_url: &str) -> Result<TokenResponse> {
    let url = format!(
        "{}/api/realtime-token",
        backend_url.trim_end_matches('/')
    );

    let response = client.post(&url).send().await?;
    if !response.status().is_success() {
        return Err(SessionError::Token(format!(
            "backend returned {}",
            response.status()
        )));
    }

    let token: TokenResponse = response.json().await?;
    tracing::info!(
        session_id = %token.session_id,
        expires_at = ?token.expires_at,
        "obtained realtime session token"
    );
    Ok(token)
}
