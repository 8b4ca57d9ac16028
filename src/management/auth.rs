use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    Res,
    error::{AuthError, SyncError},
    spotify::auth::refresh_token,
    types::Token,
};

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Single owner of the OAuth token.
///
/// Every caller goes through [`TokenManager::access_token`], which refreshes the
/// token in place when it is about to expire. The token lives behind an async
/// mutex so concurrent callers never refresh twice.
pub struct TokenManager {
    token: Mutex<Option<Token>>,
    path: Option<PathBuf>,
    http: Client,
    token_url: String,
    client_id: Option<String>,
}

impl TokenManager {
    /// Creates an in-memory manager. Nothing is written to disk unless a path is
    /// attached with [`TokenManager::with_path`].
    pub fn new(token: Option<Token>, token_url: impl Into<String>, client_id: Option<String>) -> Self {
        TokenManager {
            token: Mutex::new(token),
            path: None,
            http: Client::new(),
            token_url: token_url.into(),
            client_id,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Loads the token stored at `path`. A missing file yields an
    /// unauthenticated manager rather than an error.
    pub async fn load(
        path: impl Into<PathBuf>,
        token_url: impl Into<String>,
        client_id: Option<String>,
    ) -> Res<Self> {
        let path = path.into();
        let token = match async_fs::read_to_string(&path).await {
            Ok(content) => Some(serde_json::from_str::<Token>(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self::new(token, token_url, client_id).with_path(path))
    }

    /// Returns a usable access token, refreshing it first when it expires within
    /// [`REFRESH_MARGIN_SECS`].
    pub async fn access_token(&self) -> Res<String> {
        let mut guard = self.token.lock().await;
        let Some(token) = guard.as_ref() else {
            return Err(AuthError::Unauthenticated.into());
        };

        if token.expires_within(REFRESH_MARGIN_SECS) {
            debug!("access token expiring, refreshing");
            self.refresh_locked(&mut guard).await?;
        }

        guard
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| AuthError::Unauthenticated.into())
    }

    /// Refreshes unconditionally. Used after the API answered 401.
    pub async fn force_refresh(&self) -> Res<String> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            return Err(AuthError::Unauthenticated.into());
        }
        self.refresh_locked(&mut guard).await?;
        guard
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| AuthError::Unauthenticated.into())
    }

    async fn refresh_locked(&self, slot: &mut Option<Token>) -> Res<()> {
        let Some(current) = slot.as_ref() else {
            return Err(AuthError::Unauthenticated.into());
        };
        let Some(client_id) = self.client_id.as_deref() else {
            return Err(AuthError::MissingClientId.into());
        };

        match refresh_token(&self.http, &self.token_url, client_id, &current.refresh_token).await {
            Ok(response) => {
                let refreshed = Token {
                    access_token: response.access_token,
                    refresh_token: response
                        .refresh_token
                        .unwrap_or_else(|| current.refresh_token.clone()),
                    scope: response.scope.unwrap_or_else(|| current.scope.clone()),
                    expires_at: Utc::now().timestamp() + response.expires_in,
                };
                *slot = Some(refreshed);
                if let Some(token) = slot.as_ref() {
                    if let Err(e) = self.persist_token(token).await {
                        warn!(error = %e, "failed to persist refreshed token");
                    }
                }
                info!("access token refreshed");
                Ok(())
            }
            Err(SyncError::Auth(AuthError::InvalidGrant)) => {
                warn!("refresh token rejected, logging out");
                *slot = None;
                self.remove_file().await;
                Err(AuthError::InvalidGrant.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces the stored token (after a login) and persists it.
    pub async fn set_token(&self, token: Token) -> Res<()> {
        self.persist_token(&token).await?;
        *self.token.lock().await = Some(token);
        Ok(())
    }

    /// Destroys the token in memory and on disk.
    pub async fn logout(&self) {
        *self.token.lock().await = None;
        self.remove_file().await;
    }

    pub async fn current_token(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.lock().await.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist_token(&self, token: &Token) -> Res<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(token)?;
        async_fs::write(path, json).await?;
        Ok(())
    }

    async fn remove_file(&self) {
        if let Some(path) = self.path.as_ref() {
            if let Err(e) = async_fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, path = %path.display(), "failed to remove token file");
                }
            }
        }
    }
}

/// Default location of the token file inside the data directory.
pub fn token_path(data_dir: &Path) -> PathBuf {
    data_dir.join("token.json")
}
