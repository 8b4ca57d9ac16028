use std::{sync::Arc, time::Duration};

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    Res, config,
    error::AuthError,
    types::{PkceToken, Token, TokenResponse},
    utils,
};

/// Error body returned by the accounts service.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Posts a form to the token endpoint and decodes the token response.
///
/// The endpoint answers `400 {"error":"invalid_grant"}` when a refresh token or
/// authorization code has been revoked; that case maps to
/// [`AuthError::InvalidGrant`]. Every other failure (network, status, body)
/// maps to [`AuthError::TokenRequestFailed`].
pub async fn request_token(
    http: &Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Res<TokenResponse> {
    let response = http
        .post(token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::TokenRequestFailed {
            message: e.to_string(),
        })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::TokenRequestFailed {
            message: e.to_string(),
        })?;

    if !status.is_success() {
        if let Ok(err) = serde_json::from_str::<TokenErrorBody>(&body) {
            if err.error == "invalid_grant" {
                return Err(AuthError::InvalidGrant.into());
            }
            return Err(AuthError::TokenRequestFailed {
                message: format!(
                    "HTTP {}: {} {}",
                    status.as_u16(),
                    err.error,
                    err.error_description.unwrap_or_default()
                ),
            }
            .into());
        }
        return Err(AuthError::TokenRequestFailed {
            message: format!("HTTP {}: {}", status.as_u16(), body),
        }
        .into());
    }

    serde_json::from_str::<TokenResponse>(&body).map_err(|e| {
        AuthError::TokenRequestFailed {
            message: format!("malformed token response: {}", e),
        }
        .into()
    })
}

/// Exchanges a refresh token for a new access token.
pub async fn refresh_token(
    http: &Client,
    token_url: &str,
    client_id: &str,
    refresh_token: &str,
) -> Res<TokenResponse> {
    request_token(
        http,
        token_url,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ],
    )
    .await
}

/// Exchanges an authorization code for a token using the PKCE verifier.
///
/// The verifier proves that the client completing the flow is the one that
/// started it; it must match the challenge sent in the authorization request.
pub async fn exchange_code_pkce(code: &str, verifier: &str) -> Res<Token> {
    let client_id = config::spotify_client_id().ok_or(AuthError::MissingClientId)?;
    let redirect_uri = config::spotify_redirect_uri();

    let response = request_token(
        &Client::new(),
        &config::spotify_apitoken_url(),
        &[
            ("grant_type", "authorization_code"),
            ("client_id", &client_id),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", &redirect_uri),
        ],
    )
    .await?;

    Ok(Token {
        access_token: response.access_token,
        refresh_token: response.refresh_token.unwrap_or_default(),
        scope: response.scope.unwrap_or_default(),
        expires_at: Utc::now().timestamp() + response.expires_in,
    })
}

/// Prepares a PKCE login: generates the verifier, stores it in the shared
/// state for the callback handler and returns the authorization URL.
pub async fn begin_pkce(shared_state: &Arc<Mutex<Option<PkceToken>>>) -> Res<String> {
    let client_id = config::spotify_client_id().ok_or(AuthError::MissingClientId)?;
    let code_verifier = utils::generate_code_verifier();
    let code_challenge = utils::generate_code_challenge(&code_verifier);

    let auth_url = format!(
        "{spotify_auth_url}?client_id={client_id}&response_type=code&redirect_uri={redirect_uri}&code_challenge={code_challenge}&code_challenge_method=S256&scope={scope}",
        spotify_auth_url = config::spotify_apiauth_url(),
        client_id = client_id,
        redirect_uri = config::spotify_redirect_uri(),
        code_challenge = code_challenge,
        scope = config::spotify_scope().replace(' ', "%20"),
    );

    *shared_state.lock().await = Some(PkceToken {
        code_verifier,
        token: None,
    });
    debug!("pkce verifier stored, waiting for callback");

    Ok(auth_url)
}

/// Polls the shared state until the callback handler stored a token or
/// `max_wait` elapses.
pub async fn wait_for_token(
    shared_state: Arc<Mutex<Option<PkceToken>>>,
    max_wait: Duration,
) -> Option<Token> {
    let start = std::time::Instant::now();

    while start.elapsed() < max_wait {
        {
            let lock = shared_state.lock().await;
            if let Some(token) = lock.as_ref().and_then(|p| p.token.as_ref()) {
                return Some(token.clone());
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    None
}
