//! Bridge configuration.
//!
//! Everything has a default so hosts can pass a partial JSON document
//! (or nothing at all) and only override what they care about.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the API origin, e.g. `https://api.example.com`.
pub const API_URL_ENV: &str = "BOXTERM_API_URL";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub connection: ConnectionOptions,
    pub session: SessionOptions,
}

impl BridgeConfig {
    /// Defaults, with the API origin taken from `BOXTERM_API_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(api_url) = std::env::var(API_URL_ENV) {
            if !api_url.trim().is_empty() {
                config.connection.api_url = api_url.trim().to_string();
            }
        }
        config
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Connection Manager settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// HTTP(S) origin of the API; rewritten to ws(s) for the transport.
    pub api_url: String,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            auto_reconnect: true,
            reconnect_delay_ms: 3000,
        }
    }
}

impl ConnectionOptions {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Terminal Session Adapter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub auto_connect: bool,
    /// Typed into the remote shell once, after the first `connected` frame.
    pub initial_command: Option<String>,
    pub initial_command_delay_ms: u64,
    /// Geometry used until the host reports a real container size.
    pub cols: u16,
    pub rows: u16,
    pub scrollback: usize,
    pub font_size: f32,
    /// Shown in the welcome banner.
    pub title: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_connect: true,
            initial_command: None,
            initial_command_delay_ms: 500,
            cols: 80,
            rows: 24,
            scrollback: 1000,
            font_size: 14.0,
            title: "AI Agent Marketplace Terminal".to_string(),
        }
    }
}

impl SessionOptions {
    pub fn initial_command_delay(&self) -> Duration {
        Duration::from_millis(self.initial_command_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timings() {
        let config = BridgeConfig::default();
        assert!(config.connection.auto_reconnect);
        assert_eq!(config.connection.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(config.session.initial_command_delay(), Duration::from_millis(500));
        assert!(config.session.auto_connect);
        assert!(config.session.initial_command.is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "connection": { "api_url": "https://api.example.com" },
            "session": { "initial_command": "openclaw tui", "auto_connect": false }
        }"#;
        let config = BridgeConfig::from_json(json).unwrap();
        assert_eq!(config.connection.api_url, "https://api.example.com");
        assert_eq!(config.connection.reconnect_delay_ms, 3000);
        assert_eq!(config.session.initial_command.as_deref(), Some("openclaw tui"));
        assert!(!config.session.auto_connect);
        assert_eq!(config.session.cols, 80);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config.connection.api_url, "http://localhost:8000");
        assert_eq!(config.session.scrollback, 1000);
    }
}
