//! Channel-backed [`Connector`] for driving sessions in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::{sink, stream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;

use crate::error::TransportError;
use crate::transport::{Connector, Link};

type Inbound = Result<tungstenite::Message, tungstenite::Error>;

/// Outcome of one dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dial {
    Refuse,
    Accept,
    /// The handshake never completes.
    Hang,
    /// Opens, but the peer never drains its socket: writes never finish.
    Stall,
    /// Opens, but every write fails with a broken pipe.
    Broken,
}

/// A dial as seen by the connector.
#[derive(Debug, Clone)]
pub(crate) struct DialRecord {
    pub(crate) url: String,
    pub(crate) at: Instant,
    /// Links whose write half was still alive when this dial started.
    pub(crate) live_links: usize,
}

/// Test side of an accepted link.
pub(crate) struct MockLink {
    pub(crate) url: String,
    pub(crate) outbound: mpsc::UnboundedReceiver<tungstenite::Message>,
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
}

impl MockLink {
    /// Delivers a text frame to the session.
    pub(crate) fn push_text(&self, text: &str) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(tungstenite::Message::Text(text.into())));
        }
    }

    /// Makes the read side fail with a transport error.
    pub(crate) fn fail(&self) {
        if let Some(tx) = &self.inbound {
            let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
            let _ = tx.send(Err(tungstenite::Error::Io(io)));
        }
    }

    /// Ends the read side as if the agent went away.
    pub(crate) fn close(&mut self) {
        self.inbound = None;
    }

    /// Drains text frames written so far.
    pub(crate) fn drain_text(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = self.outbound.try_recv() {
            if let tungstenite::Message::Text(t) = msg {
                out.push(t.as_str().to_string());
            }
        }
        out
    }

    /// Returns `true` once the session has dropped its write half.
    pub(crate) fn write_closed(&mut self) -> bool {
        loop {
            match self.outbound.try_recv() {
                Ok(_) => continue,
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }
}

/// Decrements the live-link counter when the write half is dropped.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    script: Mutex<VecDeque<Dial>>,
    fallback: Dial,
    dials: Mutex<Vec<DialRecord>>,
    live: Arc<AtomicUsize>,
    links_tx: mpsc::UnboundedSender<MockLink>,
}

#[derive(Clone)]
pub(crate) struct MockConnector {
    inner: Arc<Inner>,
}

impl MockConnector {
    /// Creates a connector that answers every unscripted dial with
    /// `fallback`. Accepted links arrive on the returned receiver.
    pub(crate) fn new(fallback: Dial) -> (Self, mpsc::UnboundedReceiver<MockLink>) {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        let inner = Inner {
            script: Mutex::new(VecDeque::new()),
            fallback,
            dials: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            links_tx,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            links_rx,
        )
    }

    /// Queues outcomes for the next dials.
    pub(crate) fn script(&self, dials: impl IntoIterator<Item = Dial>) {
        self.inner.script.lock().unwrap().extend(dials);
    }

    pub(crate) fn dials(&self) -> Vec<DialRecord> {
        self.inner.dials.lock().unwrap().clone()
    }

    pub(crate) fn dial_count(&self) -> usize {
        self.inner.dials.lock().unwrap().len()
    }

    pub(crate) fn live_links(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        self.inner.dials.lock().unwrap().push(DialRecord {
            url: url.to_string(),
            at: Instant::now(),
            live_links: self.live_links(),
        });

        let plan = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.inner.fallback);

        let accept = match plan {
            Dial::Refuse => {
                return Box::pin(async { Err(TransportError::Refused("scripted".into())) });
            }
            Dial::Hang => return Box::pin(std::future::pending()),
            Dial::Accept | Dial::Stall | Dial::Broken => plan,
        };

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();

        self.inner.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(self.inner.live.clone());

        let read = stream::unfold(in_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let link = match accept {
            Dial::Stall => Link::new(
                sink::unfold(guard, |guard, _msg: tungstenite::Message| async move {
                    std::future::pending::<()>().await;
                    Ok::<_, tungstenite::Error>(guard)
                }),
                read,
            ),
            Dial::Broken => Link::new(
                sink::unfold(guard, |guard, _msg: tungstenite::Message| async move {
                    drop(guard);
                    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
                    Err::<LiveGuard, _>(tungstenite::Error::Io(io))
                }),
                read,
            ),
            _ => Link::new(
                sink::unfold(
                    (out_tx, guard),
                    |(tx, guard), msg: tungstenite::Message| async move {
                        tx.send(msg)
                            .map_err(|_| tungstenite::Error::ConnectionClosed)?;
                        Ok::<_, tungstenite::Error>((tx, guard))
                    },
                ),
                read,
            ),
        };

        let _ = self.inner.links_tx.send(MockLink {
            url: url.to_string(),
            outbound: out_rx,
            inbound: Some(in_tx),
        });
        Box::pin(async move { Ok(link) })
    }
}
