//! Main application orchestration.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::relay::Relay;
use relay_core::FeedRegistry;
use relay_feed::MessageDecoder;
use relay_hub::{BroadcastHub, HubError};
use relay_telemetry::Metrics;
use relay_ws::{ConnectionManager, ConnectionState, UpstreamEvent};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Connector to relay event queue.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// How long shutdown waits for the connector to close its session.
const CONNECTOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Main application.
pub struct Application {
    config: AppConfig,
    registry: Arc<FeedRegistry>,
    hub: Arc<BroadcastHub>,
}

impl Application {
    /// Create a new application.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let registry = Arc::new(config.build_registry()?);
        let hub = Arc::new(BroadcastHub::new(config.server.subscriber_buffer));

        info!(
            feeds = ?registry.entries().iter().map(|e| e.symbol.as_str()).collect::<Vec<_>>(),
            "Feed registry loaded"
        );

        Ok(Self {
            config,
            registry,
            hub,
        })
    }

    pub fn hub(&self) -> Arc<BroadcastHub> {
        self.hub.clone()
    }

    /// Bind the configured port and run until ctrl-c.
    pub async fn run(self) -> AppResult<()> {
        let port = self.config.server.port;
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
            .await
            .map_err(|source| HubError::Bind { port, source })?;

        self.run_until(listener, shutdown_signal()).await
    }

    /// Run on a bound listener until `shutdown` resolves or the gateway fails.
    ///
    /// Retry exhaustion on the upstream side does not end the run; the
    /// gateway keeps serving subscribers.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let (event_tx, mut event_rx) = mpsc::channel::<UpstreamEvent>(EVENT_CHANNEL_CAPACITY);

        let ws_config = self.config.connection_config(&self.registry);
        info!(
            url = %ws_config.url,
            feeds = ws_config.feed_ids.len(),
            "Configured upstream subscription"
        );

        let connector = Arc::new(ConnectionManager::new(ws_config, event_tx));
        Metrics::upstream_state_set(ConnectionState::Connecting.as_str());
        let connector_clone = connector.clone();
        let connector_handle = tokio::spawn(async move {
            match connector_clone.connect().await {
                Ok(()) => info!("Upstream connector exited"),
                Err(e) => error!(error = %e, "Upstream connector stopped"),
            }
        });

        let mut server_handle = tokio::spawn(relay_hub::serve(
            listener,
            self.hub.clone(),
            self.config.server.clone(),
        ));

        let relay = Relay::new(MessageDecoder::new(self.registry.clone()), self.hub.clone());

        tokio::pin!(shutdown);

        info!("Entering main event loop");
        let result = loop {
            tokio::select! {
                Some(event) = event_rx.recv() => {
                    relay.handle(event);
                }
                joined = &mut server_handle => {
                    break match joined {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(AppError::from(e)),
                        Err(e) => Err(AppError::Task(e.to_string())),
                    };
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
            }
        };

        connector.shutdown();
        if tokio::time::timeout(CONNECTOR_SHUTDOWN_TIMEOUT, connector_handle)
            .await
            .is_err()
        {
            warn!("Upstream connector did not stop in time");
        }
        server_handle.abort();

        info!("Application stopped");
        result
    }
}

/// Resolves on ctrl-c. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
