//! Control-plane servers
//!
//! One component owns both listeners: the HTTP control plane (viewer page,
//! player script, telemetry endpoints) and the viewer WebSocket port. Both
//! sit behind the same auth gate and both drain out when the lifecycle
//! reaches `Stopping`.

use std::future::IntoFuture;
use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::broadcast::BroadcastHub;
use crate::config::{DisplayConfig, ServerConfig, VideoConfig};
use crate::error::{Error, Result};
use crate::supervisor::LifecycleState;
use crate::telemetry::{TempStore, W1TempSensor};
use crate::web::auth::{self, AuthKey};
use crate::web::templates::PageTemplates;
use crate::web::{handlers, websocket};

/// Shared state passed to all request handlers.
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub store: Arc<TempStore>,
    pub sensor: Arc<W1TempSensor>,
    pub templates: PageTemplates,
    pub auth: AuthKey,
    pub video: VideoConfig,
    pub display: DisplayConfig,
    /// Advertised to the viewer page so it knows where to connect
    pub ws_port: u16,
}

/// Both listeners of the control plane.
pub struct WebServer {
    http: JoinHandle<std::io::Result<()>>,
    stream: JoinHandle<std::io::Result<()>>,
}

impl WebServer {
    /// Bind both ports and start serving. Fails synchronously if either
    /// port cannot be bound, so startup aborts before capture begins.
    pub async fn start(
        state: Arc<AppState>,
        config: &ServerConfig,
        lifecycle: watch::Receiver<LifecycleState>,
    ) -> Result<Self> {
        let http_addr = format!("{}:{}", config.bind_address, config.http_port);
        let ws_addr = format!("{}:{}", config.bind_address, config.ws_port);

        let http_listener = TcpListener::bind(&http_addr).await?;
        let ws_listener = TcpListener::bind(&ws_addr).await?;
        tracing::info!(%http_addr, %ws_addr, "control plane listening");

        let http = tokio::spawn(
            axum::serve(http_listener, control_router(state.clone()))
                .with_graceful_shutdown(wait_for_stop(lifecycle.clone()))
                .into_future(),
        );
        let stream = tokio::spawn(
            axum::serve(ws_listener, stream_router(state))
                .with_graceful_shutdown(wait_for_stop(lifecycle))
                .into_future(),
        );

        Ok(Self { http, stream })
    }

    /// Wait for both listeners to finish draining. Only returns promptly
    /// once the lifecycle has advanced to `Stopping` and every viewer
    /// connection has ended.
    pub async fn shutdown(self) -> Result<()> {
        let mut first_err: Option<Error> = None;
        for handle in [self.http, self.stream] {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_err.get_or_insert(Error::Io(e));
                }
                Err(e) => {
                    first_err.get_or_insert(Error::Config(format!("server task panicked: {e}")));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// HTTP control-plane routes.
fn control_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/index.html", get(handlers::index))
        .route("/jsmpg.js", get(handlers::player_script))
        .route("/temparature", get(handlers::temparature))
        .route("/history", get(handlers::history))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Viewer upgrade endpoint on its own port.
fn stream_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(websocket::ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn wait_for_stop(mut lifecycle: watch::Receiver<LifecycleState>) {
    loop {
        if *lifecycle.borrow() >= LifecycleState::Stopping {
            return;
        }
        if lifecycle.changed().await.is_err() {
            return;
        }
    }
}
