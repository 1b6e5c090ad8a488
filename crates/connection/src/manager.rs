//! Connection manager: the registry of per-host sessions.
//!
//! Holds at most one session per host ID. Replacing or terminating a
//! session waits for the old one to close its link and drop its timers
//! before anything else happens for that host. The registry map itself is
//! only locked for lookups, so a slow teardown on one host never stalls
//! another.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;
use tracing::{info, warn};

use hostlink_protocol::Message;

use crate::config::ConnectionConfig;
use crate::session::{self, SessionHandle, SessionParams};
use crate::transport::{Connector, WsConnector};
use crate::types::{ConnectionState, HostEvents};

/// One host's session, locked for the whole of a replace or teardown.
type Slot = Arc<Mutex<Option<SessionHandle>>>;

/// Manages persistent links to remote agents, keyed by host ID.
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    sessions: Mutex<HashMap<String, Slot>>,
}

impl ConnectionManager {
    /// Creates a manager that opens real WebSocket links.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, WsConnector::default())
    }

    /// Creates a manager with a custom transport.
    pub fn with_connector(config: ConnectionConfig, connector: impl Connector) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a session for `host_id`, replacing any existing one.
    ///
    /// The previous session (if any) is fully torn down first. Returns the
    /// new session's event channel; it closes when the session is
    /// terminated or gives up reconnecting.
    pub async fn connect(&self, host_id: &str, credential: &str) -> HostEvents {
        let slot = self
            .sessions
            .lock()
            .await
            .entry(host_id.to_string())
            .or_default()
            .clone();
        let mut current = slot.lock().await;

        if let Some(old) = current.take() {
            info!(host = %host_id, "replacing existing session");
            old.terminate().await;
        }

        info!(host = %host_id, origin = %self.config.origin, "connecting to agent");
        let (handle, events) = session::spawn(SessionParams {
            host_id: host_id.to_string(),
            url: self.config.origin.agent_url(credential),
            connector: self.connector.clone(),
            policy: self.config.reconnect_policy(),
            heartbeat_period: self.config.heartbeat_period(),
            forward_heartbeats: self.config.forward_heartbeats,
            event_buffer: self.config.event_buffer,
        });
        *current = Some(handle);
        events
    }

    /// Terminates the session for `host_id`. No-op if there is none.
    pub async fn disconnect(&self, host_id: &str) {
        let Some(slot) = self.slot(host_id).await else {
            return;
        };

        let mut current = slot.lock().await;
        if let Some(handle) = current.take() {
            handle.terminate().await;
            info!(host = %host_id, "disconnected from agent");
        }
        drop(current);

        self.prune(host_id, slot).await;
    }

    /// Queues `message` on the open link for `host_id` without waiting.
    ///
    /// Returns `false` if the host has no open link or its write queue is
    /// full; nothing is written in that case.
    pub async fn send(&self, host_id: &str, message: &Message) -> bool {
        let Some(tx) = self.writer(host_id).await else {
            warn!(host = %host_id, "not connected, dropping outbound message");
            return false;
        };

        let text = match message.encode() {
            Ok(t) => t,
            Err(e) => {
                warn!(host = %host_id, "failed to encode message: {e}");
                return false;
            }
        };

        match tx.try_send(tungstenite::Message::Text(text.into())) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(host = %host_id, "write queue full, dropping outbound message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(host = %host_id, "link closed, dropping outbound message");
                false
            }
        }
    }

    /// Returns `true` if `host_id` has an open link.
    pub async fn is_connected(&self, host_id: &str) -> bool {
        self.writer(host_id).await.is_some()
    }

    /// Returns the session state for `host_id`, if a session exists.
    pub async fn state(&self, host_id: &str) -> Option<ConnectionState> {
        let slot = self.slot(host_id).await?;
        let current = slot.lock().await;
        current.as_ref().map(SessionHandle::state)
    }

    /// Returns the host IDs with a session, sorted.
    pub async fn hosts(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .sessions
            .lock()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut hosts = Vec::new();
        for (id, slot) in slots {
            if slot.lock().await.is_some() {
                hosts.push(id);
            }
        }
        hosts.sort();
        hosts
    }

    /// Terminates every session.
    pub async fn disconnect_all(&self) {
        let hosts: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        join_all(hosts.iter().map(|id| self.disconnect(id))).await;
    }

    /// Terminates every session. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.disconnect_all().await;
        info!("connection manager shut down");
    }

    async fn slot(&self, host_id: &str) -> Option<Slot> {
        self.sessions.lock().await.get(host_id).cloned()
    }

    /// Write queue of the open link for `host_id`. A host that is being
    /// replaced or torn down has none.
    async fn writer(&self, host_id: &str) -> Option<mpsc::Sender<tungstenite::Message>> {
        let slot = self.slot(host_id).await?;
        let current = slot.try_lock().ok()?;
        current.as_ref()?.writer()
    }

    /// Drops the registry entry for `host_id` if its slot is empty and
    /// nobody else holds it.
    async fn prune(&self, host_id: &str, slot: Slot) {
        drop(slot);
        let mut sessions = self.sessions.lock().await;
        let vacant = sessions.get(host_id).is_some_and(|entry| {
            Arc::strong_count(entry) == 1 && entry.try_lock().is_ok_and(|current| current.is_none())
        });
        if vacant {
            sessions.remove(host_id);
        }
    }
}
