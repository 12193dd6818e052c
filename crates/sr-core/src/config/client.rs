//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use sr_protocol::{DEFAULT_MAX_PAYLOAD_SIZE, MIN_FRAME_LIMIT};

use super::serde_utils::duration_millis;

/// Configuration for a relay client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay host to connect to
    pub server_host: String,

    /// Relay TCP port
    pub server_port: u16,

    /// Relay UDP port (reported only; the datagram channel has no codec)
    pub server_udp_port: u16,

    /// Number of connect attempts before giving up
    pub reconnect_attempts: u32,

    /// Fixed delay between connect attempts
    #[serde(with = "duration_millis")]
    pub reconnect_delay: Duration,

    /// Interval between heartbeats while connected
    #[serde(with = "duration_millis")]
    pub heartbeat_interval: Duration,

    /// Timeout for a single connect attempt
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// Largest accepted frame body / payload in bytes
    pub max_payload_size: usize,

    /// Optional display name for this client
    pub client_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: "localhost".to_string(),
            server_port: 8085,
            server_udp_port: 8081,
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(5_000),
            heartbeat_interval: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(10_000),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            client_name: None,
        }
    }
}

impl ClientConfig {
    /// Relay address (`host:port`)
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Relay datagram address (`host:udp_port`)
    pub fn udp_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_udp_port)
    }

    /// Replace unusable values with defaults, logging a warning for each.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        if self.reconnect_attempts == 0 {
            tracing::warn!(
                "reconnect_attempts must be positive, using default {}",
                defaults.reconnect_attempts
            );
            self.reconnect_attempts = defaults.reconnect_attempts;
        }
        if self.heartbeat_interval.is_zero() {
            tracing::warn!(
                "heartbeat_interval must be positive, using default {:?}",
                defaults.heartbeat_interval
            );
            self.heartbeat_interval = defaults.heartbeat_interval;
        }
        if self.connect_timeout.is_zero() {
            tracing::warn!(
                "connect_timeout must be positive, using default {:?}",
                defaults.connect_timeout
            );
            self.connect_timeout = defaults.connect_timeout;
        }
        if !(MIN_FRAME_LIMIT..=i32::MAX as usize).contains(&self.max_payload_size) {
            tracing::warn!(
                "max_payload_size {} out of range, using default {}",
                self.max_payload_size,
                defaults.max_payload_size
            );
            self.max_payload_size = defaults.max_payload_size;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_address(), "localhost:8085");
        assert_eq!(config.reconnect_attempts, 3);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.client_name.is_none());
    }

    #[test]
    fn test_toml_overrides() {
        let config: ClientConfig = toml::from_str(
            r#"
            server_host = "10.1.2.3"
            reconnect_attempts = 5
            reconnect_delay = 250
            client_name = "desk"
            "#,
        )
        .unwrap();
        assert_eq!(config.server_address(), "10.1.2.3:8085");
        assert_eq!(config.reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.client_name.as_deref(), Some("desk"));
    }

    #[test]
    fn test_normalized_zero_attempts() {
        let config = ClientConfig {
            reconnect_attempts: 0,
            ..ClientConfig::default()
        }
        .normalized();
        assert_eq!(config.reconnect_attempts, 3);
    }

    #[test]
    fn test_zero_delay_is_allowed() {
        let config = ClientConfig {
            reconnect_delay: Duration::ZERO,
            ..ClientConfig::default()
        }
        .normalized();
        assert_eq!(config.reconnect_delay, Duration::ZERO);
    }

    #[test]
    fn test_normalized_rejects_unusable_frame_limit() {
        for size in [0, 8, MIN_FRAME_LIMIT - 1] {
            let config = ClientConfig {
                max_payload_size: size,
                ..ClientConfig::default()
            }
            .normalized();
            assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        }

        let config = ClientConfig {
            max_payload_size: MIN_FRAME_LIMIT,
            ..ClientConfig::default()
        }
        .normalized();
        assert_eq!(config.max_payload_size, MIN_FRAME_LIMIT);
    }

    #[test]
    fn test_udp_address() {
        let config = ClientConfig {
            server_host: "10.0.0.7".to_string(),
            server_udp_port: 9001,
            ..ClientConfig::default()
        };
        assert_eq!(config.udp_address(), "10.0.0.7:9001");
    }
}
