//! Catalog authorization
//!
//! The API is called with short-lived access tokens obtained from a
//! long-lived refresh token. The refresh token itself comes from a one-time
//! authorization code flow whose redirect lands on a local callback server.

use super::CatalogError;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Scopes needed to search, create and fill public playlists
pub const SCOPES: &str = "playlist-modify-public playlist-read-private";

/// Application credentials plus the user's refresh token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

struct TokenState {
    access_token: Option<String>,
    refresh_token: String,
    rotated: bool,
}

/// Holds the current access token and refreshes it on demand
pub(crate) struct TokenManager {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub(crate) fn new(
        http_client: reqwest::Client,
        token_url: String,
        credentials: CatalogCredentials,
    ) -> Self {
        Self {
            http_client,
            token_url,
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            state: Mutex::new(TokenState {
                access_token: None,
                refresh_token: credentials.refresh_token,
                rotated: false,
            }),
        }
    }

    /// Current access token, fetching one first if none is held
    pub(crate) async fn access_token(&self) -> Result<String, CatalogError> {
        let mut state = self.state.lock().await;
        match &state.access_token {
            Some(token) => Ok(token.clone()),
            None => self.refresh_locked(&mut state).await,
        }
    }

    /// Discard the current access token and obtain a new one
    pub(crate) async fn refresh(&self) -> Result<String, CatalogError> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    /// Refresh token issued in place of the configured one, if any
    pub(crate) async fn rotated_refresh_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.rotated.then(|| state.refresh_token.clone())
    }

    async fn refresh_locked(&self, state: &mut TokenState) -> Result<String, CatalogError> {
        debug!(token_url = %self.token_url, "Refreshing catalog access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", state.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let tokens = token_response(response).await?;

        if let Some(new_refresh) = tokens.refresh_token {
            if new_refresh != state.refresh_token {
                info!("Catalog issued a new refresh token");
                state.refresh_token = new_refresh;
                state.rotated = true;
            }
        }

        state.access_token = Some(tokens.access_token.clone());
        Ok(tokens.access_token)
    }
}

async fn token_response(response: reqwest::Response) -> Result<TokenResponse, CatalogError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CatalogError::Auth(format!(
            "Token endpoint returned {}: {}",
            status.as_u16(),
            body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| CatalogError::Parse(e.to_string()))
}

/// URL the user opens to grant access
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> Result<String, CatalogError> {
    let url = reqwest::Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPES),
        ],
    )
    .map_err(|e| CatalogError::Auth(e.to_string()))?;

    Ok(url.into())
}

/// Trade an authorization code for access and refresh tokens
pub async fn exchange_code(
    http_client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, CatalogError> {
    let response = http_client
        .post(token_url)
        .basic_auth(client_id, Some(client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| CatalogError::Network(e.to_string()))?;

    token_response(response).await
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(sender): State<mpsc::Sender<CallbackParams>>,
    Query(params): Query<CallbackParams>,
) -> &'static str {
    let granted = params.code.is_some();
    if sender.send(params).await.is_err() {
        warn!("Authorization callback arrived after the flow ended");
    }

    if granted {
        "Authorization received. You can close this window."
    } else {
        "Authorization was not granted."
    }
}

/// Serve the redirect URI until the catalog calls back, returning the code
pub async fn receive_authorization_code(redirect_uri: &str) -> Result<String, CatalogError> {
    let url = reqwest::Url::parse(redirect_uri)
        .map_err(|e| CatalogError::Auth(format!("Invalid redirect URI {}: {}", redirect_uri, e)))?;
    let host = url.host_str().unwrap_or("127.0.0.1").to_string();
    let port = url.port_or_known_default().unwrap_or(3000);
    let path = url.path().to_string();

    let (sender, mut receiver) = mpsc::channel::<CallbackParams>(1);
    let app = Router::new().route(&path, get(callback)).with_state(sender);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| CatalogError::Auth(format!("Bind {}:{} failed: {}", host, port, e)))?;

    info!("Waiting for authorization callback on {}", redirect_uri);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let params = receiver.recv().await;
    let _ = shutdown_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Callback server failed"),
        Err(e) => warn!(error = %e, "Callback server task failed"),
    }

    match params {
        Some(CallbackParams {
            code: Some(code), ..
        }) => Ok(code),
        Some(CallbackParams { error, .. }) => Err(CatalogError::Auth(format!(
            "Authorization denied: {}",
            error.unwrap_or_else(|| "no code returned".to_string())
        ))),
        None => Err(CatalogError::Auth("Callback server stopped".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_carries_scopes_and_redirect() {
        let url = authorize_url("abc", "http://127.0.0.1:3000/callback").unwrap();

        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=abc"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A3000%2Fcallback"));
        assert!(url.contains("scope=playlist-modify-public+playlist-read-private"));
    }
}
