//! Tunnel state and event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tunnel's connector process
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectorState {
    /// Provisioned, connector not started
    #[default]
    Idle,
    /// Connector is being spawned
    Launching,
    /// Connector is running
    Connected { since: DateTime<Utc> },
    /// Connector exited on its own with a failure; teardown follows
    Crashed { code: Option<i32> },
    /// Connector is being terminated
    Closing,
    /// Connector is down and remote resources were released
    Closed,
}

impl ConnectorState {
    /// Whether the state is terminal
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Launching => "launching",
            Self::Connected { .. } => "connected",
            Self::Crashed { .. } => "crashed",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

/// Events emitted by a tunnel handle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TunnelEvent {
    /// Connector started, `domain` now routes to `service`
    Connected { domain: String, service: String },
    /// Connector stopped and remote resources were released
    Closed { domain: String },
    /// Connector crashed or teardown failed
    Failed { domain: String, error: String },
}
