//! OAuth2 user authorization: token cache, callback listener, and flow orchestration.

pub mod browser;
pub mod cache;
pub mod callback;
pub mod manager;

pub use browser::{SystemBrowser, UrlOpener};
pub use cache::{TokenCache, TokenRecord};
pub use callback::CallbackListener;
pub use manager::OAuthManager;
