//! Gateway configuration.

use serde::{Deserialize, Serialize};

/// Subscriber gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// WebSocket upgrade path.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Maximum concurrent subscribers.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Per-subscriber outbound queue capacity.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_port() -> u16 {
    8081
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_connections() -> usize {
    100
}

fn default_subscriber_buffer() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            ws_path: default_ws_path(),
            max_connections: default_max_connections(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: ServerConfig = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.subscriber_buffer, 64);
    }
}
