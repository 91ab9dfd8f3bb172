//! Browser launch as an injected capability.

/// Hands an authorization URL to the user. Injected into the OAuth manager
/// so tests can drive the callback without a real browser.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Default opener using the system browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) {
        tracing::info!("Opening browser for authorization: {url}");
        if let Err(err) = open::that(url) {
            tracing::warn!("Failed to open browser ({err}); visit the URL above manually");
        }
    }
}
