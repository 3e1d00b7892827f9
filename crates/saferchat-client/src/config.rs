//! Session configuration.

use std::time::Duration;

use saferchat_core::ConnectionConfig;
use serde::{Deserialize, Serialize};

/// Default keepalive period while in a channel.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Default delay before reconnecting after a drop.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default bound on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Period of the empty keepalive frame while joined.
    pub keepalive_interval: Duration,

    /// Delay before the single reconnection attempt after a drop.
    pub reconnect_delay: Duration,

    /// Longest a connection attempt may take before it counts as failed.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl From<&SessionConfig> for ConnectionConfig {
    fn from(config: &SessionConfig) -> Self {
        Self { keepalive_interval: config.keepalive_interval, reconnect_delay: config.reconnect_delay }
    }
}
