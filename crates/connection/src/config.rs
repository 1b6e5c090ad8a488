//! Connection manager configuration.
//!
//! Usually embedded in an application's TOML file:
//!
//! ```toml
//! origin = "https://deploy.example.com:8443"
//! base_delay_ms = 3000
//! max_attempts = 5
//! heartbeat_period_ms = 30000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use hostlink_protocol::Origin;
use hostlink_protocol::constants::{
    HEARTBEAT_PERIOD, MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY,
};

use crate::reconnection::ReconnectPolicy;

/// Errors from parsing or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Connection manager settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Control-plane origin; decides `ws` vs `wss` and the agent host.
    #[serde(default)]
    pub origin: Origin,

    /// Reconnect delay unit in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Consecutive reconnect attempts before a session gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Heartbeat period in milliseconds.
    #[serde(default = "default_heartbeat_period_ms")]
    pub heartbeat_period_ms: u64,

    /// Capacity of each session's event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Deliver inbound heartbeat frames to the caller as well.
    #[serde(default)]
    pub forward_heartbeats: bool,
}

fn default_base_delay_ms() -> u64 {
    RECONNECT_BASE_DELAY.as_millis() as u64
}

fn default_max_attempts() -> u32 {
    MAX_RECONNECT_ATTEMPTS
}

fn default_heartbeat_period_ms() -> u64 {
    HEARTBEAT_PERIOD.as_millis() as u64
}

fn default_event_buffer() -> usize {
    256
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            origin: Origin::default(),
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
            heartbeat_period_ms: default_heartbeat_period_ms(),
            event_buffer: default_event_buffer(),
            forward_heartbeats: false,
        }
    }
}

impl ConnectionConfig {
    /// Convenience constructor with every other field defaulted.
    pub fn with_origin(origin: Origin) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_period_ms must be greater than zero".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "event_buffer must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_attempts: self.max_attempts,
        }
    }

    /// Heartbeat period, never zero.
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms.max(1))
    }
}
