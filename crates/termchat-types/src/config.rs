//! Server configuration types for TermChat.
//!
//! `ServerConfig` is the top-level `termchat_{env}.toml`. Every field has a
//! default so an empty or missing file still yields a runnable server, except
//! for the message key which must be supplied by file or environment.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the TermChat server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the telnet line protocol.
    #[serde(default = "default_tcp_addr")]
    pub tcp_addr: String,

    /// Listen address for the HTTP health endpoint.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// SQLite URL. When unset the database lives in the data directory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Base64-encoded 256-bit message key.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Number of messages shown by `/last`.
    #[serde(default = "default_history_preview")]
    pub history_preview: usize,

    /// Per-channel buffer of the relay bus.
    #[serde(default = "default_relay_capacity")]
    pub relay_capacity: usize,

    /// Longest accepted input line in bytes.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_tcp_addr() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_history_preview() -> usize {
    5
}

fn default_relay_capacity() -> usize {
    1024
}

fn default_max_line_length() -> usize {
    4096
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_addr: default_tcp_addr(),
            http_addr: default_http_addr(),
            database_url: None,
            encryption_key: None,
            history_preview: default_history_preview(),
            relay_capacity: default_relay_capacity(),
            max_line_length: default_max_line_length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.tcp_addr, "0.0.0.0:9000");
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.history_preview, 5);
        assert!(config.database_url.is_none());
        assert!(config.encryption_key.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ServerConfig = toml::from_str(r#"tcp_addr = "127.0.0.1:2323""#).unwrap();
        assert_eq!(config.tcp_addr, "127.0.0.1:2323");
        assert_eq!(config.relay_capacity, 1024);
        assert_eq!(config.max_line_length, 4096);
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(ServerConfig::default()).unwrap();
        assert_eq!(json["history_preview"], 5);
    }
}
