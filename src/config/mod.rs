//! Configuration loaded from environment variables (with `.env` support).

use std::time::Duration;

/// OAuth flow configuration for the Feishu user-authorization flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Feishu app ID (`APP_ID`).
    pub app_id: String,
    /// Feishu app secret (`APP_SECRET`).
    pub app_secret: String,
    /// Local callback path, e.g. `/oauth/callback`.
    pub redirect_path: String,
    /// Local callback port the transient listener binds to.
    pub callback_port: u16,
    /// OAuth scope string; empty disables the `scope` query parameter.
    pub scope: String,
    /// Remote authorize endpoint (browser-navigated).
    pub authorize_url: String,
    /// Remote token endpoint (code exchange and refresh).
    pub token_url: String,
    /// How long to wait for the authorization callback.
    pub code_timeout: Duration,
    /// Total budget for waiting on the callback port to free up.
    pub port_wait_budget: Duration,
    /// Interval between port availability checks.
    pub port_check_interval: Duration,
}

impl OAuthConfig {
    /// The redirect URI registered with the authorize endpoint.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.callback_port, self.redirect_path)
    }
}

/// Application settings, resolved from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// MCP server name (`MCP_SERVER_NAME`).
    pub server_name: String,
    /// Port for the streamable-HTTP transport (`MCP_PORT`).
    pub mcp_port: u16,
    /// Feishu API base URL (`HOST`), without trailing slash.
    pub host: String,
    pub oauth: OAuthConfig,
}

impl Settings {
    /// Load settings from the environment, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let host = var_or("HOST", "https://open.feishu.cn/open-apis");
        let host = host.trim_end_matches('/').to_string();

        Self {
            server_name: var_or("MCP_SERVER_NAME", "feishu_mcp"),
            mcp_port: var_parsed("MCP_PORT", 8001),
            host,
            oauth: OAuthConfig {
                app_id: var_or("APP_ID", ""),
                app_secret: var_or("APP_SECRET", ""),
                redirect_path: var_or("OAUTH_REDIRECT_URI", "/oauth/callback"),
                callback_port: var_parsed("OAUTH_CALLBACK_PORT", 8089),
                scope: var_or("OAUTH_SCOPE", "docs:doc drive:drive docx:document"),
                authorize_url: var_or(
                    "OAUTH_AUTHORIZE_URL",
                    "https://accounts.feishu.cn/open-apis/authen/v1/authorize",
                ),
                token_url: var_or(
                    "OAUTH_TOKEN_URL",
                    "https://open.feishu.cn/open-apis/authen/v2/oauth/token",
                ),
                code_timeout: Duration::from_secs(300),
                port_wait_budget: Duration::from_secs(5),
                port_check_interval: Duration::from_millis(100),
            },
        }
    }

    /// Validate that the credentials required for OAuth are present.
    pub fn require_credentials(&self) -> crate::error::Result<()> {
        if self.oauth.app_id.is_empty() || self.oauth.app_secret.is_empty() {
            return Err(crate::error::FeishuError::Configuration(
                "APP_ID and APP_SECRET must be set".to_string(),
            ));
        }
        Ok(())
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn var_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
