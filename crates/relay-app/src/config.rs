//! Application configuration.

use crate::error::{AppError, AppResult};
use relay_core::FeedRegistry;
use relay_hub::ServerConfig;
use relay_ws::{ConnectionConfig, ReconnectPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Used when neither `--config` nor `RELAY_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Subscriber gateway.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream Hermes connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Tracked feeds. Empty means the compiled-in table.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

/// Upstream connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Consecutive reconnect attempts before the connector stops.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

fn default_upstream_url() -> String {
    "wss://hermes.pyth.network/ws".to_string()
}

fn default_max_retries() -> u32 {
    ReconnectPolicy::DEFAULT_MAX_RETRIES
}

fn default_reconnect_base_delay_ms() -> u64 {
    ReconnectPolicy::DEFAULT_BASE_DELAY_MS
}

fn default_reconnect_max_delay_ms() -> u64 {
    ReconnectPolicy::DEFAULT_MAX_DELAY_MS
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            max_retries: default_max_retries(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

/// One `[[feeds]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: String,
    pub symbol: String,
}

impl AppConfig {
    /// Load, apply the `PORT` override and validate.
    ///
    /// An explicit path must exist. Without one, a missing
    /// `config/default.toml` falls back to built-in defaults.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => {
                tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                Self::default()
            }
        };

        config.apply_port_override(std::env::var("PORT").ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// `PORT` wins over `[server].port`.
    pub fn apply_port_override(&mut self, port: Option<&str>) -> AppResult<()> {
        if let Some(raw) = port {
            self.server.port = raw
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid PORT {raw:?}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::Config("server.port must be non-zero".to_string()));
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(AppError::Config(format!(
                "server.ws_path must start with '/': {:?}",
                self.server.ws_path
            )));
        }
        if self.server.max_connections == 0 {
            return Err(AppError::Config(
                "server.max_connections must be non-zero".to_string(),
            ));
        }
        if self.server.subscriber_buffer == 0 {
            return Err(AppError::Config(
                "server.subscriber_buffer must be non-zero".to_string(),
            ));
        }
        if self.upstream.url.trim().is_empty() {
            return Err(AppError::Config("upstream.url must not be empty".to_string()));
        }

        // Rejects malformed or duplicate feed ids.
        self.build_registry()?;
        Ok(())
    }

    /// Feed registry from `[[feeds]]`, or the compiled-in table.
    pub fn build_registry(&self) -> AppResult<FeedRegistry> {
        let registry = if self.feeds.is_empty() {
            FeedRegistry::with_defaults()?
        } else {
            FeedRegistry::from_pairs(
                self.feeds
                    .iter()
                    .map(|feed| (feed.id.as_str(), feed.symbol.clone())),
            )?
        };
        Ok(registry)
    }

    /// Connector settings subscribing to every registry id.
    pub fn connection_config(&self, registry: &FeedRegistry) -> ConnectionConfig {
        ConnectionConfig {
            url: self.upstream.url.clone(),
            max_retries: self.upstream.max_retries,
            reconnect_base_delay_ms: self.upstream.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.upstream.reconnect_max_delay_ms,
            feed_ids: registry.ids(),
        }
    }
}
