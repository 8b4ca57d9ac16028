use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    config, error,
    management::{TokenManager, token_path},
    server::start_api_server,
    spotify::auth::{begin_pkce, wait_for_token},
    success,
    types::PkceToken,
    warning,
};

use super::fail;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn auth() {
    let shared_state: Arc<Mutex<Option<PkceToken>>> = Arc::new(Mutex::new(None));

    let server_state = Arc::clone(&shared_state);
    let server = tokio::spawn(async move {
        if let Err(e) = start_api_server(server_state).await {
            warning!("Callback server stopped: {}", e);
        }
    });

    let auth_url = match begin_pkce(&shared_state).await {
        Ok(url) => url,
        Err(e) => fail("Cannot start login", e),
    };

    if webbrowser::open(&auth_url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        )
    }

    let token = wait_for_token(shared_state, LOGIN_TIMEOUT).await;
    server.abort();

    let Some(token) = token else {
        error!("Authentication failed or timed out.");
    };

    let data_dir = config::data_dir();
    let manager = TokenManager::new(
        None,
        config::spotify_apitoken_url(),
        config::spotify_client_id(),
    )
    .with_path(token_path(&data_dir));
    if let Err(e) = manager.set_token(token).await {
        fail("Failed to save token", e);
    }

    success!("Authentication successful!");
}
