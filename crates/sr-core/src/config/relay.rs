//! Relay server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use sr_protocol::{DEFAULT_MAX_PAYLOAD_SIZE, MIN_FRAME_LIMIT};

use super::serde_utils::duration_millis;

/// Configuration for the relay server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host/interface to bind the TCP listener to
    pub host: String,

    /// TCP port for session connections
    pub port: u16,

    /// UDP port for the datagram side channel
    pub udp_port: u16,

    /// Whether to bind the datagram side channel at all
    pub enable_udp: bool,

    /// Maximum number of concurrent sessions; extra connections are closed
    pub max_sessions: usize,

    /// Number of session read loops allowed to run at once
    pub worker_pool_size: usize,

    /// Interval between liveness sweeps
    #[serde(with = "duration_millis")]
    pub heartbeat_interval: Duration,

    /// Silence after which a session is evicted
    #[serde(with = "duration_millis")]
    pub client_timeout: Duration,

    /// Largest accepted frame body / payload in bytes
    pub max_payload_size: usize,

    /// How long shutdown waits for session tasks before forcing them down
    #[serde(with = "duration_millis")]
    pub shutdown_grace: Duration,

    /// How long a send may wait on a full outbound queue before the
    /// recipient is dropped
    #[serde(with = "duration_millis")]
    pub send_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8085,
            udp_port: 8081,
            enable_udp: true,
            max_sessions: 50,
            worker_pool_size: 20,
            heartbeat_interval: Duration::from_millis(30_000),
            client_timeout: Duration::from_millis(60_000),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            shutdown_grace: Duration::from_millis(5_000),
            send_timeout: Duration::from_millis(5_000),
        }
    }
}

impl RelayConfig {
    /// TCP bind address (`host:port`)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// UDP bind address (`host:udp_port`)
    pub fn udp_address(&self) -> String {
        format!("{}:{}", self.host, self.udp_port)
    }

    /// Replace unusable values with defaults, logging a warning for each.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        if self.max_sessions == 0 {
            tracing::warn!(
                "max_sessions must be positive, using default {}",
                defaults.max_sessions
            );
            self.max_sessions = defaults.max_sessions;
        }
        if self.worker_pool_size == 0 {
            tracing::warn!(
                "worker_pool_size must be positive, using default {}",
                defaults.worker_pool_size
            );
            self.worker_pool_size = defaults.worker_pool_size;
        }
        if self.heartbeat_interval.is_zero() {
            tracing::warn!(
                "heartbeat_interval must be positive, using default {:?}",
                defaults.heartbeat_interval
            );
            self.heartbeat_interval = defaults.heartbeat_interval;
        }
        if self.client_timeout.is_zero() {
            tracing::warn!(
                "client_timeout must be positive, using default {:?}",
                defaults.client_timeout
            );
            self.client_timeout = defaults.client_timeout;
        }
        if self.send_timeout.is_zero() {
            tracing::warn!(
                "send_timeout must be positive, using default {:?}",
                defaults.send_timeout
            );
            self.send_timeout = defaults.send_timeout;
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

    /// Print the effective configuration at info level
    pub fn log_summary(&self) {
        tracing::info!(
            "Relay config: tcp={} udp={} (enabled: {}) max_sessions={} pool={} sweep={:?} \
             timeout={:?} send_timeout={:?} max_payload={}",
            self.bind_address(),
            self.udp_port,
            self.enable_udp,
            self.max_sessions,
            self.worker_pool_size,
            self.heartbeat_interval,
            self.client_timeout,
            self.send_timeout,
            self.max_payload_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 8085);
        assert_eq!(config.udp_port, 8081);
        assert_eq!(config.max_sessions, 50);
        assert_eq!(config.worker_pool_size, 20);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.client_timeout, Duration::from_secs(60));
        assert_eq!(config.max_payload_size, 1024 * 1024);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
        assert_eq!(config.bind_address(), "0.0.0.0:8085");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            port = 9000
            client_timeout = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.client_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_sessions, 50);
    }

    #[test]
    fn test_normalized_replaces_zeroes() {
        let config = RelayConfig {
            max_sessions: 0,
            worker_pool_size: 0,
            heartbeat_interval: Duration::ZERO,
            client_timeout: Duration::ZERO,
            max_payload_size: 0,
            send_timeout: Duration::ZERO,
            ..RelayConfig::default()
        }
        .normalized();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_normalized_rejects_limit_below_fixed_body() {
        let config = RelayConfig {
            max_payload_size: 8,
            ..RelayConfig::default()
        }
        .normalized();
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);

        let config = RelayConfig {
            max_payload_size: MIN_FRAME_LIMIT - 1,
            ..RelayConfig::default()
        }
        .normalized();
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_normalized_keeps_valid_values() {
        let config = RelayConfig {
            max_sessions: 3,
            client_timeout: Duration::from_millis(200),
            ..RelayConfig::default()
        };
        assert_eq!(config.clone().normalized(), config);
    }
}
