//! Integration tests for the durable token cache: on-disk format,
//! identity scoping, and manager persistence across restarts.

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use std::sync::Arc;

use feishu_mcp::auth::{OAuthManager, TokenCache};
use feishu_mcp::client::FeishuClient;
use feishu_mcp::config::OAuthConfig;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config(app_id: &str) -> OAuthConfig {
    OAuthConfig {
        app_id: app_id.to_string(),
        app_secret: "SECRET".to_string(),
        redirect_path: "/oauth/callback".to_string(),
        callback_port: 8089,
        scope: "docs:doc drive:drive docx:document".to_string(),
        authorize_url: "https://accounts.feishu.cn/open-apis/authen/v1/authorize".to_string(),
        token_url: "https://open.feishu.cn/open-apis/authen/v2/oauth/token".to_string(),
        code_timeout: std::time::Duration::from_secs(300),
        port_wait_budget: std::time::Duration::from_secs(5),
        port_check_interval: std::time::Duration::from_millis(100),
    }
}

// ---------------------------------------------------------------------------
// On-disk format
// ---------------------------------------------------------------------------

#[test]
fn cache_file_holds_exactly_the_identity_scoped_record() {
    let dir = TempDir::new().unwrap();
    let cache = TokenCache::new(dir.path().to_path_buf(), "cli_demo");
    cache.save(Some("u-access"), Some("u-refresh"));

    let raw = fs::read_to_string(dir.path().join("tokens.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "app_id": "cli_demo",
            "access_token": "u-access",
            "refresh_token": "u-refresh",
        })
    );
}

#[cfg(unix)]
#[test]
fn cache_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let cache = TokenCache::new(dir.path().to_path_buf(), "cli_demo");
    cache.save(Some("u-access"), None);

    let mode = fs::metadata(cache.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn save_creates_missing_cache_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("deeper").join("still");
    let cache = TokenCache::new(nested, "cli_demo");
    cache.save(Some("u-access"), None);
    assert!(cache.load().is_some());
}

// ---------------------------------------------------------------------------
// Manager persistence across restarts
// ---------------------------------------------------------------------------

#[test]
fn tokens_survive_a_manager_restart() {
    let dir = TempDir::new().unwrap();

    {
        let cache = TokenCache::new(dir.path().to_path_buf(), "APP");
        let manager = OAuthManager::new(test_config("APP"), cache);
        manager.set_tokens("T1", Some("R1".to_string()));
    }

    let cache = TokenCache::new(dir.path().to_path_buf(), "APP");
    let restarted = OAuthManager::new(test_config("APP"), cache);
    assert_eq!(restarted.access_token().as_deref(), Some("T1"));
    assert_eq!(restarted.refresh_token().as_deref(), Some("R1"));
}

#[test]
fn tokens_for_another_app_identity_are_not_loaded() {
    let dir = TempDir::new().unwrap();

    {
        let cache = TokenCache::new(dir.path().to_path_buf(), "OLD_APP");
        let manager = OAuthManager::new(test_config("OLD_APP"), cache);
        manager.set_tokens("T1", Some("R1".to_string()));
    }

    let cache = TokenCache::new(dir.path().to_path_buf(), "NEW_APP");
    let restarted = OAuthManager::new(test_config("NEW_APP"), cache);
    assert!(restarted.access_token().is_none());
    assert!(restarted.refresh_token().is_none());
}

#[test]
fn client_exposes_token_state_and_clearing() {
    let dir = TempDir::new().unwrap();
    let cache = TokenCache::new(dir.path().to_path_buf(), "APP");
    let manager = Arc::new(OAuthManager::new(test_config("APP"), cache));
    let client = FeishuClient::with_manager(manager.clone());

    assert!(client.user_token().is_none());

    manager.set_tokens("T1", Some("R1".to_string()));
    assert_eq!(client.user_token().as_deref(), Some("T1"));

    client.clear_tokens();
    assert!(client.user_token().is_none());
    assert!(!dir.path().join("tokens.json").exists());
}

#[test]
fn clearing_tokens_removes_the_cache_file() {
    let dir = TempDir::new().unwrap();
    let cache = TokenCache::new(dir.path().to_path_buf(), "APP");
    let manager = OAuthManager::new(test_config("APP"), cache);

    manager.set_tokens("T1", Some("R1".to_string()));
    assert!(dir.path().join("tokens.json").exists());

    manager.clear_tokens();
    assert!(!dir.path().join("tokens.json").exists());
}
