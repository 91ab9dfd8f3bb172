//! OAuth2 authorization-code flow orchestration and token lifecycle.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::browser::{SystemBrowser, UrlOpener};
use super::cache::TokenCache;
use super::callback::CallbackListener;
use crate::client::pipeline::TokenSource;
use crate::config::OAuthConfig;
use crate::error::{FeishuError, Result};

/// In-memory token pair owned by the manager.
#[derive(Debug, Clone, Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Manages the OAuth2 user-authorization flow for Feishu: first-time
/// browser authorization, token exchange, refresh, and cache sync.
///
/// Token mutations are serialized through an internal flow mutex, so
/// concurrent requests observing a 401 produce a single refresh (or a
/// single browser authorization) instead of racing.
pub struct OAuthManager {
    config: OAuthConfig,
    cache: TokenCache,
    http: reqwest::Client,
    opener: Arc<dyn UrlOpener>,
    state: RwLock<TokenState>,
    /// Single-flight guard around refresh-or-authorize.
    flow_lock: tokio::sync::Mutex<()>,
}

impl OAuthManager {
    pub fn new(config: OAuthConfig, cache: TokenCache) -> Self {
        Self::with_opener(config, cache, Arc::new(SystemBrowser))
    }

    /// Construct with an injected browser capability. Cached tokens for the
    /// configured app identity are loaded eagerly.
    pub fn with_opener(config: OAuthConfig, cache: TokenCache, opener: Arc<dyn UrlOpener>) -> Self {
        let mut state = TokenState::default();
        if let Some(record) = cache.load() {
            state.access_token = record.access_token;
            state.refresh_token = record.refresh_token;
        }
        Self {
            config,
            cache,
            http: reqwest::Client::new(),
            opener,
            state: RwLock::new(state),
            flow_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Currently held access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.state.read().unwrap().access_token.clone()
    }

    /// Currently held refresh token, if any.
    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().unwrap().refresh_token.clone()
    }

    /// Replace the in-memory tokens and persist them. Omitting `refresh`
    /// retains the previously held refresh token.
    pub fn set_tokens(&self, access: impl Into<String>, refresh: Option<String>) {
        let (access, refresh) = {
            let mut state = self.state.write().unwrap();
            state.access_token = Some(access.into());
            if refresh.is_some() {
                state.refresh_token = refresh;
            }
            (state.access_token.clone(), state.refresh_token.clone())
        };
        self.cache.save(access.as_deref(), refresh.as_deref());
    }

    /// Wipe in-memory and durable token state; idempotent.
    pub fn clear_tokens(&self) {
        *self.state.write().unwrap() = TokenState::default();
        self.cache.clear();
    }

    /// Return a valid access token, running the full authorization flow
    /// when none is held.
    pub async fn ensure_token(&self) -> Result<String> {
        if let Some(token) = self.access_token() {
            return Ok(token);
        }
        let _flow = self.flow_lock.lock().await;
        // Another caller may have finished authorizing while we waited.
        if let Some(token) = self.access_token() {
            return Ok(token);
        }
        let (access, _refresh) = self.authorize_inner().await?;
        Ok(access)
    }

    /// Run the full browser-mediated authorization flow.
    pub async fn authorize(&self) -> Result<(String, Option<String>)> {
        let _flow = self.flow_lock.lock().await;
        self.authorize_inner().await
    }

    async fn authorize_inner(&self) -> Result<(String, Option<String>)> {
        let port = self.config.callback_port;
        if port_in_use(port) {
            // A previous listener instance may still be releasing the port.
            if !self.wait_for_port_release(port).await {
                return Err(FeishuError::PortConflict { port });
            }
        }

        let mut listener = CallbackListener::start(port, &self.config.redirect_path).await?;

        let auth_url = self.authorize_url()?;
        self.opener.open(&auth_url);
        tracing::info!(port, "Waiting for authorization callback");

        let code = listener.wait_for_code(self.config.code_timeout).await;
        // Listener cleanup is unconditional, success or failure.
        listener.stop().await;
        let code = code?;

        let (access, refresh) = self.exchange_code(&code).await?;
        self.set_tokens(access.clone(), refresh.clone());
        Ok((access, refresh))
    }

    /// The authorization URL handed to the user's browser.
    pub fn authorize_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|err| FeishuError::Configuration(format!("invalid authorize URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.app_id)
            .append_pair("redirect_uri", &self.config.redirect_uri())
            .append_pair("response_type", "code");
        if !self.config.scope.is_empty() {
            url.query_pairs_mut().append_pair("scope", &self.config.scope);
        }
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<(String, Option<String>)> {
        let body = serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": self.config.app_id,
            "client_secret": self.config.app_secret,
            "code": code,
            "redirect_uri": self.config.redirect_uri(),
        });
        let response = self.http.post(&self.config.token_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FeishuError::api(status.as_u16(), text));
        }
        let parsed: TokenResponse = response.json().await?;
        let access = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                FeishuError::AuthorizationFailed("token endpoint returned no access token".to_string())
            })?;
        Ok((access, parsed.refresh_token))
    }

    /// Refresh the access token using the held refresh token.
    ///
    /// Returns `None` when no refresh token is held or the refresh fails.
    /// Any failure clears all stored tokens so the next `ensure_token`
    /// re-enters the authorize path; refresh is never retried in place.
    pub async fn refresh(&self) -> Option<String> {
        let _flow = self.flow_lock.lock().await;
        self.refresh_inner().await
    }

    async fn refresh_inner(&self) -> Option<String> {
        let refresh_token = self.refresh_token()?;

        let body = serde_json::json!({
            "grant_type": "refresh_token",
            "client_id": self.config.app_id,
            "client_secret": self.config.app_secret,
            "refresh_token": refresh_token,
        });
        let response = match self.http.post(&self.config.token_url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!("Token refresh request failed: {err}");
                self.clear_tokens();
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Token refresh rejected");
            self.clear_tokens();
            return None;
        }
        let parsed: TokenResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!("Malformed token refresh response: {err}");
                self.clear_tokens();
                return None;
            }
        };
        match parsed.access_token.filter(|token| !token.is_empty()) {
            Some(access) => {
                self.set_tokens(access.clone(), parsed.refresh_token);
                Some(access)
            }
            None => {
                self.clear_tokens();
                None
            }
        }
    }

    async fn wait_for_port_release(&self, port: u16) -> bool {
        let mut elapsed = Duration::ZERO;
        while elapsed < self.config.port_wait_budget {
            if !port_in_use(port) {
                return true;
            }
            tokio::time::sleep(self.config.port_check_interval).await;
            elapsed += self.config.port_check_interval;
        }
        !port_in_use(port)
    }
}

#[async_trait]
impl TokenSource for OAuthManager {
    async fn ensure_token(&self) -> Result<String> {
        OAuthManager::ensure_token(self).await
    }

    async fn refresh_after(&self, stale: &str) -> Option<String> {
        let _flow = self.flow_lock.lock().await;
        // A concurrent flow may have already rotated the token.
        if let Some(current) = self.access_token() {
            if current != stale {
                return Some(current);
            }
        }
        self.refresh_inner().await
    }

    async fn reauthorize(&self) -> Result<String> {
        let _flow = self.flow_lock.lock().await;
        let (access, _refresh) = self.authorize_inner().await?;
        Ok(access)
    }
}

fn port_in_use(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
}
