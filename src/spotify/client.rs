//! Authenticated HTTP transport for the Spotify Web API.

use std::{sync::Arc, time::Duration};

use reqwest::{
    Method, StatusCode,
    header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT},
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    Res, config,
    error::{AuthError, SyncError},
    management::TokenManager,
    spotify::rate_limit::{RateLimitGate, parse_retry_after},
};

const USER_AGENT_VALUE: &str = concat!("spurge/", env!("CARGO_PKG_VERSION"));

/// Marker the API puts in 403 bodies when the token lacks a scope.
const INSUFFICIENT_SCOPE: &str = "Insufficient client scope";

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Web API, without trailing slash.
    pub api_url: String,

    /// Token endpoint used for refreshes.
    pub token_url: String,

    /// OAuth client id, required for refreshing tokens.
    pub client_id: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts allowed for a request answered with 5xx.
    pub max_server_attempts: u32,

    /// Backoff after the n-th 5xx is `backoff_step * n`.
    pub backoff_step: Duration,

    /// Wall-clock length of one Retry-After second.
    pub rate_limit_unit: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: config::DEFAULT_API_URL.to_string(),
            token_url: config::DEFAULT_TOKEN_URL.to_string(),
            client_id: None,
            timeout_secs: 30,
            max_server_attempts: 5,
            backoff_step: Duration::from_millis(1000),
            rate_limit_unit: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Builds the configuration from the environment (see [`crate::config`]).
    pub fn from_env() -> Self {
        Self {
            api_url: config::spotify_apiurl(),
            token_url: config::spotify_apitoken_url(),
            client_id: config::spotify_client_id(),
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    pub fn with_rate_limit_unit(mut self, unit: Duration) -> Self {
        self.rate_limit_unit = unit;
        self
    }
}

/// Hooks invoked by the transport while it absorbs retryable failures.
pub trait TransportObserver: Send + Sync {
    /// A 429 was received; all requests now wait `retry_after_secs`.
    fn on_rate_limit(&self, _retry_after_secs: u64) {}

    /// A 5xx was received; the request is retried after a backoff.
    fn on_retry(&self, _attempt: u32, _status: u16) {}
}

impl TransportObserver for () {}

/// Spotify Web API client.
///
/// Cheap to clone: the HTTP pool, token manager and rate-limit gate are shared.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    gate: Arc<RateLimitGate>,
    config: Arc<ClientConfig>,
}

impl SpotifyClient {
    /// Creates a client bound to the process-wide rate-limit gate.
    pub fn new(config: ClientConfig, tokens: Arc<TokenManager>) -> Res<Self> {
        Self::with_rate_limit_gate(config, tokens, RateLimitGate::global())
    }

    /// Creates a client with its own rate-limit gate.
    pub fn with_rate_limit_gate(
        config: ClientConfig,
        tokens: Arc<TokenManager>,
        gate: Arc<RateLimitGate>,
    ) -> Res<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| SyncError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let config = ClientConfig {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            ..config
        };

        Ok(Self {
            http,
            tokens,
            gate,
            config: Arc::new(config),
        })
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Absolute URL for an API path such as `me/tracks`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url, path.trim_start_matches('/'))
    }

    /// Sends a request, absorbing rate limits, server errors and one token
    /// refresh.
    ///
    /// - 401: refresh once and replay the identical request once.
    /// - 429: push the shared deadline by `Retry-After`, notify, wait, retry. Never fatal.
    /// - 5xx: notify, back off `backoff_step * attempt`, give up after
    ///   `max_server_attempts` with [`SyncError::Server`].
    /// - 403 "Insufficient client scope": [`AuthError::InsufficientScope`].
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        observer: &dyn TransportObserver,
    ) -> Res<reqwest::Response> {
        let mut refreshed = false;
        let mut server_attempts: u32 = 0;

        loop {
            self.gate.wait().await;
            let token = self.tokens.access_token().await?;

            match self.request_once(method.clone(), url, query, &token).await {
                Ok(response) => return Ok(response),
                Err(SyncError::Auth(AuthError::Unauthenticated)) if !refreshed => {
                    debug!(url = %url, "401 received, refreshing token");
                    self.tokens.force_refresh().await?;
                    refreshed = true;
                }
                Err(SyncError::RateLimited { retry_after }) => {
                    let secs = retry_after.as_secs();
                    warn!(url = %url, retry_after = secs, "rate limited");
                    self.gate
                        .block_for(self.config.rate_limit_unit * secs as u32);
                    observer.on_rate_limit(secs);
                }
                Err(SyncError::Server { status, body }) => {
                    server_attempts += 1;
                    if server_attempts >= self.config.max_server_attempts {
                        return Err(SyncError::Server { status, body });
                    }
                    let backoff = self.config.backoff_step * server_attempts;
                    warn!(
                        url = %url,
                        status,
                        attempt = server_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "server error, retrying"
                    );
                    observer.on_retry(server_attempts, status);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One request without retries, with the status mapped onto [`SyncError`].
    async fn request_once(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Res<reqwest::Response> {
        let mut request = self.http.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(AuthError::Unauthenticated.into()),
            StatusCode::TOO_MANY_REQUESTS => {
                let secs = parse_retry_after(
                    response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok()),
                );
                Err(SyncError::RateLimited {
                    retry_after: Duration::from_secs(secs),
                })
            }
            StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                if body.contains(INSUFFICIENT_SCOPE) {
                    return Err(AuthError::InsufficientScope.into());
                }
                Err(SyncError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
            s if s.is_server_error() => Err(SyncError::Server {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
            _ => Err(SyncError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// GET an absolute URL and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        observer: &dyn TransportObserver,
    ) -> Res<T> {
        let response = self.send(Method::GET, url, query, observer).await?;
        let body = response.text().await?;
        serde_json::from_str::<T>(&body).map_err(|e| SyncError::Decode {
            message: format!("{} ({}): {}", url, e, truncate(&body, 200)),
        })
    }

    /// DELETE with the ids in the query string. The response body is ignored.
    pub async fn delete_ids(
        &self,
        path: &str,
        extra: &[(&str, String)],
        ids: &[String],
        observer: &dyn TransportObserver,
    ) -> Res<()> {
        let mut query: Vec<(&str, String)> = extra.to_vec();
        query.push(("ids", ids.join(",")));
        self.send(Method::DELETE, &self.endpoint(path), &query, observer)
            .await?;
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

    use super::*;

    fn client(server: &MockServer) -> SpotifyClient {
        let tokens = TokenManager::new(None, format!("{}/api/token", server.uri()), None);
        SpotifyClient::with_rate_limit_gate(
            ClientConfig::default().with_api_url(server.uri()),
            Arc::new(tokens),
            Arc::new(RateLimitGate::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_request_once_classifies_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("gateway"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let client = client(&server);
        let url = client.endpoint("me");

        let err = client.request_once(Method::GET, &url, &[], "t").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::RateLimited { retry_after } if retry_after == Duration::from_secs(7)
        ));

        let err = client.request_once(Method::GET, &url, &[], "t").await.unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 502, ref body } if body == "gateway"));

        let err = client.request_once(Method::GET, &url, &[], "t").await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(AuthError::Unauthenticated)));
    }
}
