//! Per-host session actor.
//!
//! Each session is a single task that owns its attempt counter and state.
//! It cycles `Connecting -> Open -> Reconnecting -> Connecting` until the
//! reconnect budget runs out or the manager terminates it. Every suspension
//! point races the session's cancellation token, so a terminated session
//! never fires a stale timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::pumps::heartbeat::heartbeat_pump;
use crate::pumps::read::{LinkEnd, ReadContext, read_pump};
use crate::pumps::write::write_pump;
use crate::reconnection::{ReconnectPolicy, wait_or_cancel};
use crate::transport::{Connector, Link};
use crate::types::{ConnectionState, HostEvent, HostEvents};

/// Capacity of the per-link outbound queue.
pub(crate) const WRITE_QUEUE: usize = 256;

/// Write half of the currently open link, if any.
type LinkSlot = Arc<Mutex<Option<mpsc::Sender<tungstenite::Message>>>>;

/// Everything needed to start a session.
pub(crate) struct SessionParams {
    pub(crate) host_id: String,
    pub(crate) url: String,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) heartbeat_period: Duration,
    pub(crate) forward_heartbeats: bool,
    pub(crate) event_buffer: usize,
}

/// Manager-side handle to a running session.
pub(crate) struct SessionHandle {
    link: LinkSlot,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Returns the write queue of the open link, if the session is open.
    pub(crate) fn writer(&self) -> Option<mpsc::Sender<tungstenite::Message>> {
        if !self.state.borrow().is_open() {
            return None;
        }
        let slot = self.link.lock().ok()?;
        slot.as_ref().filter(|tx| !tx.is_closed()).cloned()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.writer().is_some()
    }

    /// Cancels the session and waits until its link is closed and all of
    /// its timers are gone.
    pub(crate) async fn terminate(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await
            && e.is_panic()
        {
            warn!("session task panicked: {e}");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns a session task and returns its handle and event channel.
pub(crate) fn spawn(params: SessionParams) -> (SessionHandle, HostEvents) {
    let (events_tx, events_rx) = mpsc::channel(params.event_buffer.max(1));
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let cancel = CancellationToken::new();
    let link = LinkSlot::default();

    let session = Session {
        host_id: params.host_id,
        url: params.url,
        connector: params.connector,
        policy: params.policy,
        heartbeat_period: params.heartbeat_period,
        forward_heartbeats: params.forward_heartbeats,
        attempts: 0,
        link: link.clone(),
        state: state_tx,
        events: events_tx,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(session.run());

    let handle = SessionHandle {
        link,
        state: state_rx,
        cancel,
        task,
    };
    (handle, events_rx)
}

struct Session {
    host_id: String,
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    heartbeat_period: Duration,
    forward_heartbeats: bool,
    /// Reconnect attempts since the last successful open.
    attempts: u32,
    link: LinkSlot,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<HostEvent>,
    cancel: CancellationToken,
}

impl Session {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);
            debug!(host = %self.host_id, attempt = self.attempts, "opening link");

            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                r = self.connector.connect(&self.url) => r,
            };

            match opened {
                Ok(link) => {
                    self.attempts = 0;
                    match self.run_link(link).await {
                        LinkEnd::Cancelled if self.cancel.is_cancelled() => break,
                        LinkEnd::Cancelled => {
                            info!(host = %self.host_id, "link cancelled");
                        }
                        LinkEnd::PeerClosed => {
                            info!(host = %self.host_id, "link closed by agent");
                        }
                        LinkEnd::Failed(e) => {
                            warn!(host = %self.host_id, error = %e, "link failed");
                            self.report(e);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        host = %self.host_id,
                        attempt = self.attempts,
                        error = %e,
                        "failed to open link"
                    );
                    self.report(e);
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            let Some(delay) = self.policy.next_delay(self.attempts) else {
                info!(
                    host = %self.host_id,
                    attempts = self.attempts,
                    "reconnect budget exhausted, giving up"
                );
                self.set_state(ConnectionState::Disconnected);
                return;
            };

            self.attempts += 1;
            self.set_state(ConnectionState::Reconnecting {
                attempt: self.attempts,
                delay,
            });
            info!(
                host = %self.host_id,
                attempt = self.attempts,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );

            if !wait_or_cancel(delay, &self.cancel).await {
                break;
            }
        }

        self.set_state(ConnectionState::Terminated);
        debug!(host = %self.host_id, "session terminated");
    }

    /// Drives one open link until it ends, then tears it down: heartbeat
    /// stopped, write handle cleared, transport closed. Teardown is bounded
    /// by the write pump's deadlines.
    async fn run_link(&mut self, link: Link) -> LinkEnd {
        let Link { sink, stream } = link;
        let link_cancel = self.cancel.child_token();
        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE);

        let write_handle = tokio::spawn(write_pump(sink, write_rx, link_cancel.clone()));
        self.set_writer(Some(write_tx.clone()));
        self.set_state(ConnectionState::Open);
        info!(host = %self.host_id, "link open");

        let heartbeat_handle = tokio::spawn(heartbeat_pump(
            write_tx.clone(),
            self.heartbeat_period,
            link_cancel.clone(),
        ));

        let ctx = ReadContext {
            host_id: &self.host_id,
            events: &self.events,
            write_tx: &write_tx,
            forward_heartbeats: self.forward_heartbeats,
        };
        let end = read_pump(stream, ctx, &link_cancel).await;

        link_cancel.cancel();
        self.set_writer(None);
        drop(write_tx);
        let _ = heartbeat_handle.await;
        let written = write_handle.await;

        // A failed write is what cancelled the link; surface its cause.
        match (end, written) {
            (LinkEnd::Cancelled, Ok(Err(e))) if !self.cancel.is_cancelled() => {
                LinkEnd::Failed(e)
            }
            (end, _) => end,
        }
    }

    fn set_writer(&self, writer: Option<mpsc::Sender<tungstenite::Message>>) {
        if let Ok(mut slot) = self.link.lock() {
            *slot = writer;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state.clone());
        self.emit(HostEvent::StateChanged {
            host_id: self.host_id.clone(),
            state,
        });
    }

    fn report(&self, error: TransportError) {
        self.emit(HostEvent::Error {
            host_id: self.host_id.clone(),
            error,
        });
    }

    /// Lifecycle events never block the state machine; if the caller is not
    /// draining the channel they are dropped.
    fn emit(&self, event: HostEvent) {
        if let Err(mpsc::error::TrySendError::Full(ev)) = self.events.try_send(event) {
            warn!(host = %self.host_id, event = ?ev, "event channel full, dropping event");
        }
    }
}
