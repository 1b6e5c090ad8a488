//! Public types for the connection manager.

use std::time::Duration;

use tokio::sync::mpsc;

use hostlink_protocol::Message;

use crate::error::TransportError;

/// Connection state of a host session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport open in progress.
    Connecting,
    /// Link open, heartbeat running.
    Open,
    /// Link lost; the next attempt fires after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect budget exhausted. Nothing further happens until the
    /// caller connects again.
    Disconnected,
    /// Session ended by an explicit disconnect.
    Terminated,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Events delivered on a session's channel, in the order they happened.
#[derive(Debug)]
pub enum HostEvent {
    /// An application frame received from the agent.
    Message { host_id: String, message: Message },
    /// Opening the link failed, or an open link failed mid-session.
    Error {
        host_id: String,
        error: TransportError,
    },
    /// The session moved to a new state.
    StateChanged {
        host_id: String,
        state: ConnectionState,
    },
}

impl HostEvent {
    pub fn host_id(&self) -> &str {
        match self {
            Self::Message { host_id, .. }
            | Self::Error { host_id, .. }
            | Self::StateChanged { host_id, .. } => host_id,
        }
    }
}

/// Receiving end of a session's event channel.
///
/// The channel closes once the session is terminated or gives up.
pub type HostEvents = mpsc::Receiver<HostEvent>;
