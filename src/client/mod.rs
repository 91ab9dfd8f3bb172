//! Feishu API client: OAuth token management plus the request pipeline.

pub mod pipeline;

use std::sync::Arc;

use crate::auth::{OAuthManager, TokenCache};
use crate::config::Settings;

pub use pipeline::{parse_response, ApiEnvelope, RequestPipeline, TokenSource};

/// Feishu API client composing the OAuth manager with the authenticated
/// request pipeline. Constructed once at process entry and injected into
/// every service that needs authenticated HTTP.
pub struct FeishuClient {
    oauth: Arc<OAuthManager>,
    pipeline: Arc<RequestPipeline>,
}

impl FeishuClient {
    /// Build a client from settings, with the default per-user token cache.
    pub fn new(settings: &Settings) -> Self {
        let cache = TokenCache::new_default(&settings.oauth.app_id);
        Self::with_manager(Arc::new(OAuthManager::new(settings.oauth.clone(), cache)))
    }

    /// Build a client around an existing manager (tests inject one with a
    /// temp cache and a fake browser).
    pub fn with_manager(oauth: Arc<OAuthManager>) -> Self {
        let pipeline = Arc::new(RequestPipeline::new(oauth.clone()));
        Self { oauth, pipeline }
    }

    pub fn oauth(&self) -> &Arc<OAuthManager> {
        &self.oauth
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// Current user access token, if one is held.
    pub fn user_token(&self) -> Option<String> {
        self.oauth.access_token()
    }

    /// Clear stored tokens, forcing re-authentication on the next request.
    pub fn clear_tokens(&self) {
        self.oauth.clear_tokens();
    }
}
