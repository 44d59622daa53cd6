//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use relay_core::StatusEvent;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{HubError, HubResult};
use crate::hub::BroadcastHub;

/// Caps concurrent subscriber connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot. The slot is held until the guard is dropped, so the guard
    /// can move into the upgraded connection's task.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct GatewayState {
    hub: Arc<BroadcastHub>,
    limiter: Arc<ConnectionLimiter>,
    config: ServerConfig,
}

impl GatewayState {
    pub fn new(hub: Arc<BroadcastHub>, config: ServerConfig) -> Self {
        Self {
            hub,
            limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
        }
    }
}

/// `GET /api/status` body.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub subscribers: usize,
    pub max_connections: usize,
    pub upstream: Option<StatusEvent>,
    pub timestamp_ms: i64,
}

/// Create the axum router.
pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        .route(&state.config.ws_path, get(ws_handler))
        .route("/api/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

async fn get_status(State(state): State<GatewayState>) -> Json<StatusSnapshot> {
    Json(StatusSnapshot {
        subscribers: state.hub.len(),
        max_connections: state.limiter.max(),
        upstream: state.hub.last_status(),
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    })
}

async fn get_metrics() -> Response {
    match relay_telemetry::gather_text() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.limiter.try_acquire() else {
        warn!(
            current = state.limiter.current_count(),
            max = state.limiter.max(),
            "Subscriber connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.on_upgrade(move |socket| handle_subscriber(socket, state, guard))
}

/// Forward hub messages to one subscriber until either side closes.
async fn handle_subscriber(socket: WebSocket, state: GatewayState, _guard: ConnectionGuard) {
    let mut subscription = state.hub.register();
    let id = subscription.id;
    let (mut sender, mut receiver) = socket.split();

    // Inbound frames are ignored; this task only watches for close.
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Subscriber sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Subscriber receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            next = subscription.receiver.recv() => {
                let Some(payload) = next else {
                    debug!(subscriber = id, "Subscriber queue closed");
                    break;
                };
                if sender.send(Message::Text(payload.as_ref().into())).await.is_err() {
                    debug!(subscriber = id, "Failed to send message, subscriber disconnected");
                    break;
                }
            }
            _ = &mut incoming_task => {
                debug!(subscriber = id, "Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    state.hub.unregister(id);
    let _ = sender.close().await;
}

/// Bind `0.0.0.0:port` and serve until the process exits.
pub async fn run_server(hub: Arc<BroadcastHub>, config: ServerConfig) -> HubResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| HubError::Bind {
            port: config.port,
            source,
        })?;
    serve(listener, hub, config).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, hub: Arc<BroadcastHub>, config: ServerConfig) -> HubResult<()> {
    let local_addr = listener.local_addr()?;
    info!(
        addr = %local_addr,
        path = %config.ws_path,
        "Subscriber gateway listening"
    );

    let app = create_router(GatewayState::new(hub, config));
    axum::serve(listener, app).await?;
    Ok(())
}
