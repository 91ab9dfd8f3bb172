//! Transient local HTTP listener that captures one authorization code.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::{FeishuError, Result};

/// Grace delay after shutdown so the OS releases the port before a
/// successor tries to bind it.
const PORT_RELEASE_GRACE: Duration = Duration::from_millis(100);

const SUCCESS_PAGE: &str = "<script>setTimeout(function() { window.close(); }, 1000);</script>\
Authorization successful! The page will close automatically...";
const FAILURE_PAGE: &str = "Authorization failed!";

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

type CodeSender = oneshot::Sender<Result<String>>;

#[derive(Clone)]
struct CallbackState {
    // take()n by the first matching callback; later hits find None.
    sender: Arc<Mutex<Option<CodeSender>>>,
}

/// Aborts the server task if the listener is dropped without an explicit stop,
/// so a cancelled authorization still releases the port.
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One-shot callback listener bound to `localhost:{port}`.
///
/// Serves a single GET route at the configured path. The first request
/// carrying a `code` query parameter resolves the pending code; duplicate
/// callbacks get the same success page but are otherwise no-ops.
pub struct CallbackListener {
    port: u16,
    code_rx: Option<oneshot::Receiver<Result<String>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
    _abort: AbortOnDrop,
}

impl CallbackListener {
    /// Bind the listener and start serving the callback route.
    pub async fn start(port: u16, path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(FeishuError::Configuration(format!(
                "callback path must start with '/': {path}"
            )));
        }

        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state = CallbackState {
            sender: Arc::new(Mutex::new(Some(code_tx))),
        };
        let app = Router::new()
            .route(path, get(handle_callback))
            .with_state(state);

        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        tracing::debug!(port, path, "OAuth callback listener started");

        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = serve.await {
                tracing::error!("OAuth callback server error: {err}");
            }
        });
        let abort = AbortOnDrop(task.abort_handle());

        Ok(Self {
            port,
            code_rx: Some(code_rx),
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
            _abort: abort,
        })
    }

    /// Wait for the authorization code, bounded by `timeout`.
    pub async fn wait_for_code(&mut self, timeout: Duration) -> Result<String> {
        let rx = self.code_rx.take().ok_or_else(|| {
            FeishuError::AuthorizationFailed("authorization code already consumed".to_string())
        })?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(FeishuError::AuthorizationFailed(
                "callback listener stopped before a code was received".to_string(),
            )),
            Err(_) => Err(FeishuError::AuthorizationTimeout {
                seconds: timeout.as_secs(),
            }),
        }
    }

    /// Stop the listener and release the port.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            // A stalled connection must not hold the flow open forever.
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
                abort.abort();
            }
        }
        tokio::time::sleep(PORT_RELEASE_GRACE).await;
        tracing::debug!(port = self.port, "OAuth callback listener stopped");
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    let sender = state.sender.lock().ok().and_then(|mut guard| guard.take());
    match query.code {
        Some(code) => {
            if let Some(tx) = sender {
                let _ = tx.send(Ok(code));
            }
            Html(SUCCESS_PAGE)
        }
        None => {
            if let Some(tx) = sender {
                let _ = tx.send(Err(FeishuError::AuthorizationFailed(
                    "no code received".to_string(),
                )));
            }
            Html(FAILURE_PAGE)
        }
    }
}
