//! CLI auth command handlers for login, status, and logout.

use crate::client::FeishuClient;
use crate::config::Settings;

/// Handle `feishu-mcp auth login`.
pub async fn handle_login(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    settings.require_credentials()?;
    let client = FeishuClient::new(settings);

    if client.user_token().is_some() {
        println!("ℹ️  Existing tokens found; re-authorizing...");
    }
    println!("🔗 Opening browser for Feishu authorization...");
    println!("   If no browser opens, visit: {}", client.oauth().authorize_url()?);

    match client.oauth().authorize().await {
        Ok((_access, refresh)) => {
            println!("✅ Feishu login successful!");
            if refresh.is_none() {
                println!("⚠️  No refresh token was issued; you will be asked to re-authorize when the token expires.");
            }
            Ok(())
        }
        Err(err) if err.is_authorization() => {
            eprintln!("❌ Authorization did not complete: {err}");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

/// Handle `feishu-mcp auth status`.
pub async fn handle_status(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    settings.require_credentials()?;
    let client = FeishuClient::new(settings);

    match (client.user_token(), client.oauth().refresh_token()) {
        (Some(_), Some(_)) => println!("✅ Logged in (access + refresh token cached)"),
        (Some(_), None) => println!("✅ Logged in (access token only; no refresh token)"),
        (None, Some(_)) => println!("⚠️  Refresh token cached but no access token; next request will refresh"),
        (None, None) => println!("❌ Not logged in. Run: feishu-mcp auth login"),
    }
    Ok(())
}

/// Handle `feishu-mcp auth logout`.
pub async fn handle_logout(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    settings.require_credentials()?;
    let client = FeishuClient::new(settings);
    client.clear_tokens();
    println!("✅ Cached tokens cleared");
    Ok(())
}
