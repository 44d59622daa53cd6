//! Upstream connection manager.
//!
//! Owns the single upstream session: connects, sends the subscribe request,
//! classifies inbound frames and publishes everything that happens as
//! `UpstreamEvent`s. Reconnection follows `ReconnectPolicy`; once the policy
//! is exhausted the manager enters `Stopped` and never connects again.

use crate::backoff::{ReconnectDecision, ReconnectPolicy};
use crate::error::{WsError, WsResult};
use crate::message::{SubscribeRequest, UpstreamMessage};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Close code for a normal close.
pub const NORMAL_CLOSE: u16 = 1000;
/// Close frame without a status code.
pub const NO_STATUS_CLOSE: u16 = 1005;
/// Connection dropped without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Logged payloads are cut to this many bytes.
const LOG_PAYLOAD_LIMIT: usize = 256;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upstream WebSocket URL.
    pub url: String,
    /// Consecutive reconnect attempts before giving up.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Feed ids sent in the subscribe request.
    pub feed_ids: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "wss://hermes.pyth.network/ws".to_string(),
            max_retries: ReconnectPolicy::DEFAULT_MAX_RETRIES,
            reconnect_base_delay_ms: ReconnectPolicy::DEFAULT_BASE_DELAY_MS,
            reconnect_max_delay_ms: ReconnectPolicy::DEFAULT_MAX_DELAY_MS,
            feed_ids: Vec::new(),
        }
    }
}

impl ConnectionConfig {
    fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.max_retries,
            self.reconnect_base_delay_ms,
            self.reconnect_max_delay_ms,
        )
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Retry ceiling reached. Terminal.
    Stopped,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Stopped => "stopped",
        }
    }
}

/// Everything the connector reports to the relay, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Session open; the subscribe request follows immediately.
    Connected,
    /// Classified inbound message.
    Message(UpstreamMessage),
    /// Transport failure (connect, read or write). Always followed by `Closed`.
    Error(String),
    /// Session ended.
    Closed { code: u16, reason: String },
    /// Next attempt is scheduled after `delay`.
    ReconnectScheduled {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    /// Retry ceiling reached; nothing follows.
    Stopped { attempts: u32 },
}

/// How a session ended without a transport error.
enum SessionEnd {
    Closed { code: u16, reason: String },
    Shutdown,
}

/// Upstream connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    policy: Mutex<ReconnectPolicy>,
    event_tx: mpsc::Sender<UpstreamEvent>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(config: ConnectionConfig, event_tx: mpsc::Sender<UpstreamEvent>) -> Self {
        let policy = config.reconnect_policy();
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            policy: Mutex::new(policy),
            event_tx,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Consecutive failed attempts since the last successful connect.
    pub fn retry_count(&self) -> u32 {
        self.policy.lock().retry_count()
    }

    /// Signal graceful shutdown.
    ///
    /// Cancels the shutdown token, which stops the read loop, a pending
    /// connect, or the backoff timer, whichever is active.
    pub fn shutdown(&self) {
        info!("Upstream connector shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and keep the session alive until shutdown or retry exhaustion.
    ///
    /// Returns `Ok(())` on shutdown and `WsError::RetriesExhausted` once the
    /// reconnect ceiling is hit.
    pub async fn connect(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            let (code, reason) = match self.try_connect().await {
                Ok(SessionEnd::Shutdown) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Ok(SessionEnd::Closed { code, reason }) => (code, reason),
                Err(e) => {
                    error!(error = %e, "Upstream connection error");
                    self.emit(UpstreamEvent::Error(e.to_string())).await;
                    (ABNORMAL_CLOSE, e.to_string())
                }
            };

            self.set_state(ConnectionState::Disconnected);
            warn!(code, close = describe_close(code), %reason, "Upstream connection closed");
            self.emit(UpstreamEvent::Closed { code, reason }).await;

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                return Ok(());
            }

            let (decision, max_retries) = {
                let mut policy = self.policy.lock();
                (policy.on_close(), policy.max_retries())
            };

            match decision {
                ReconnectDecision::Stop => {
                    error!(
                        attempts = max_retries,
                        "Max reconnection attempts reached, upstream connector stopped"
                    );
                    self.set_state(ConnectionState::Stopped);
                    self.emit(UpstreamEvent::Stopped {
                        attempts: max_retries,
                    })
                    .await;
                    return Err(WsError::RetriesExhausted {
                        attempts: max_retries,
                    });
                }
                ReconnectDecision::Retry { attempt, delay } => {
                    warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting"
                    );
                    self.set_state(ConnectionState::Connecting);
                    self.emit(UpstreamEvent::ReconnectScheduled {
                        attempt,
                        max_retries,
                        delay,
                    })
                    .await;

                    // Cancellation-aware backoff
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.shutdown_token.cancelled() => {
                            info!("Shutdown requested during backoff, exiting");
                            self.set_state(ConnectionState::Disconnected);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<SessionEnd> {
        info!(url = %self.config.url, "Connecting to upstream");

        let connect = connect_async_tls_with_config(self.config.url.as_str(), None, true, None);
        let (ws_stream, _response) = tokio::select! {
            result = connect => result?,
            () = self.shutdown_token.cancelled() => return Ok(SessionEnd::Shutdown),
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        self.policy.lock().on_connected();
        info!("Upstream connected");
        self.emit(UpstreamEvent::Connected).await;

        let request = SubscribeRequest::new(self.config.feed_ids.clone());
        let payload = serde_json::to_string(&request)?;
        info!(feeds = request.ids.len(), %payload, "Sending subscribe request");
        write.send(Message::Text(payload)).await?;

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in upstream read loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(SessionEnd::Shutdown);
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((NO_STATUS_CLOSE, String::new()));
                            return Ok(SessionEnd::Closed { code, reason });
                        }
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            return Ok(SessionEnd::Closed {
                                code: ABNORMAL_CLOSE,
                                reason: "stream ended".to_string(),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    async fn handle_text_message(&self, text: &str) {
        match UpstreamMessage::parse(text) {
            Ok(message) => {
                debug!(kind = message.kind(), "Upstream message received");
                self.emit(UpstreamEvent::Message(message)).await;
            }
            Err(e) => {
                // Protocol-shape errors never take the session down.
                warn!(
                    error = %e,
                    payload = %truncate(text, LOG_PAYLOAD_LIMIT),
                    "Dropping unparseable upstream message"
                );
            }
        }
    }

    async fn emit(&self, event: UpstreamEvent) {
        if self.event_tx.send(event).await.is_err() {
            warn!("Upstream event receiver dropped");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

/// Human-readable close classification for logs.
pub fn describe_close(code: u16) -> &'static str {
    match code {
        NORMAL_CLOSE => "normal close",
        ABNORMAL_CLOSE => "abnormal disconnect",
        _ => "error code",
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
