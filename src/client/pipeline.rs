//! Authenticated request pipeline: bearer injection and single-retry on 401.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;

use crate::error::{FeishuError, Result};

/// Seam between the request pipeline and the OAuth manager.
///
/// Implemented by [`crate::auth::OAuthManager`]; tests substitute a mock
/// to exercise the retry contract without a browser flow.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a valid access token, running the authorization flow if none
    /// is held.
    async fn ensure_token(&self) -> Result<String>;

    /// Rotate a stale token after a 401. Returns the replacement token, or
    /// `None` when a full re-authorization is required.
    async fn refresh_after(&self, stale: &str) -> Option<String>;

    /// Run the full authorization flow and return the new access token.
    async fn reauthorize(&self) -> Result<String>;
}

/// Executes outbound HTTP calls with bearer-token injection and at most one
/// retry on authorization failure.
///
/// Per logical request at most three HTTP calls are issued: the original,
/// one token exchange (refresh or re-authorization), and one retry of the
/// original. A 401 on the retried call is returned to the caller as-is.
pub struct RequestPipeline {
    source: Arc<dyn TokenSource>,
    http: reqwest::Client,
}

impl RequestPipeline {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            http: reqwest::Client::new(),
        }
    }

    /// Execute one request. `headers` are merged over the defaults and win
    /// on conflict, except `Authorization`, which this layer always sets.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Response> {
        let token = self.source.ensure_token().await?;
        let response = self
            .send(method.clone(), url, body, headers.clone(), &token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(url, "Request unauthorized; rotating token");
        let retry_token = match self.source.refresh_after(&token).await {
            Some(token) => token,
            None => self.source.reauthorize().await?,
        };
        self.send(method, url, body, headers, &retry_token).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        headers: Option<HeaderMap>,
        token: &str,
    ) -> Result<Response> {
        let mut merged = HeaderMap::new();
        merged.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(extra) = headers {
            for (name, value) in extra.iter() {
                merged.insert(name, value.clone());
            }
        }
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            FeishuError::AuthorizationFailed("access token is not a valid header value".to_string())
        })?;
        merged.insert(AUTHORIZATION, bearer);

        let mut request = self.http.request(method, url).headers(merged);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, None, None).await
    }

    pub async fn post(&self, url: &str, body: &serde_json::Value) -> Result<Response> {
        self.request(Method::POST, url, Some(body), None).await
    }

    pub async fn patch(&self, url: &str, body: &serde_json::Value) -> Result<Response> {
        self.request(Method::PATCH, url, Some(body), None).await
    }

    pub async fn delete(&self, url: &str, body: &serde_json::Value) -> Result<Response> {
        self.request(Method::DELETE, url, Some(body), None).await
    }
}

/// Envelope every Feishu endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Parse a document-API response, enforcing both HTTP success and the
/// structured `code == 0` success flag.
pub async fn parse_response(response: Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FeishuError::api(status.as_u16(), body));
    }
    let envelope: ApiEnvelope = response.json().await?;
    if envelope.code != 0 {
        return Err(FeishuError::Business {
            code: envelope.code,
            message: envelope.msg,
        });
    }
    Ok(envelope.data)
}
