use std::{collections::HashMap, sync::Arc};

use axum::{Extension, extract::Query, response::Html};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{spotify::auth::exchange_code_pkce, types::PkceToken};

/// Redirect target of the Spotify authorization page. Stores the exchanged
/// token in the shared state, where `spurge auth` polls for it.
pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(shared_state): Extension<Arc<Mutex<Option<PkceToken>>>>,
) -> Html<&'static str> {
    if let Some(reason) = params.get("error") {
        warn!(%reason, "authorization denied");
        return Html("<h4>Login was denied.</h4>");
    }

    let Some(code) = params.get("code") else {
        return Html("<h4>Missing authorization code.</h4>");
    };

    let mut state = shared_state.lock().await;
    let Some(pkce_state) = state.as_mut() else {
        return Html("<h4>Missing PKCE code verifier.</h4>");
    };

    match exchange_code_pkce(code, &pkce_state.code_verifier).await {
        Ok(token) => {
            debug!("authorization code exchanged");
            pkce_state.token = Some(token);
            Html("<h2>Authentication successful.</h2><p>You can close this window.</p>")
        }
        Err(e) => {
            warn!(error = %e, "token exchange failed");
            Html("<h4>Login failed.</h4>")
        }
    }
}
