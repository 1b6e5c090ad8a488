//! Read pump: decodes inbound frames and dispatches them to the session's
//! event channel.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hostlink_protocol::Message;
use hostlink_protocol::constants::MAX_FRAME_SIZE;

use crate::error::TransportError;
use crate::types::HostEvent;

/// Why a link stopped.
#[derive(Debug)]
pub(crate) enum LinkEnd {
    /// The link or its session was cancelled locally.
    Cancelled,
    /// Peer sent a close frame or the stream ended.
    PeerClosed,
    /// Transport failure while the link was open.
    Failed(TransportError),
}

/// Per-link settings the read pump needs.
pub(crate) struct ReadContext<'a> {
    pub(crate) host_id: &'a str,
    pub(crate) events: &'a mpsc::Sender<HostEvent>,
    pub(crate) write_tx: &'a mpsc::Sender<tungstenite::Message>,
    pub(crate) forward_heartbeats: bool,
}

/// Reads frames until the link ends or `cancel` fires.
pub(crate) async fn read_pump<S>(
    mut read: S,
    ctx: ReadContext<'_>,
    cancel: &CancellationToken,
) -> LinkEnd
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => return LinkEnd::Cancelled,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(tungstenite::Message::Text(text))) => {
                let Some(message) = decode_frame(text.as_str(), ctx.host_id) else {
                    continue;
                };
                if message.is_heartbeat() && !ctx.forward_heartbeats {
                    trace!(host = %ctx.host_id, "received heartbeat");
                    continue;
                }
                let event = HostEvent::Message {
                    host_id: ctx.host_id.to_string(),
                    message,
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return LinkEnd::Cancelled,
                    sent = ctx.events.send(event) => {
                        if sent.is_err() {
                            trace!(host = %ctx.host_id, "event receiver dropped");
                        }
                    }
                }
            }
            Some(Ok(tungstenite::Message::Ping(data))) => {
                trace!(host = %ctx.host_id, "received ping, sending pong");
                if ctx.write_tx.try_send(tungstenite::Message::Pong(data)).is_err() {
                    debug!(host = %ctx.host_id, "write queue unavailable, pong dropped");
                }
            }
            Some(Ok(tungstenite::Message::Pong(_))) => {
                trace!(host = %ctx.host_id, "received pong");
            }
            Some(Ok(tungstenite::Message::Close(frame))) => {
                debug!(host = %ctx.host_id, ?frame, "received close frame");
                return LinkEnd::PeerClosed;
            }
            Some(Ok(tungstenite::Message::Binary(data))) => {
                debug!(host = %ctx.host_id, len = data.len(), "dropping binary frame");
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(host = %ctx.host_id, "WebSocket read error: {e}");
                return LinkEnd::Failed(e.into());
            }
            None => {
                debug!(host = %ctx.host_id, "WebSocket stream ended");
                return LinkEnd::PeerClosed;
            }
        }
    }
}

/// Decodes a text frame. Oversized or malformed frames are logged and
/// dropped; they never end the link.
fn decode_frame(text: &str, host_id: &str) -> Option<Message> {
    if text.len() > MAX_FRAME_SIZE {
        warn!(host = %host_id, "frame too large ({} bytes), dropping", text.len());
        return None;
    }

    match Message::decode(text) {
        Ok(m) => {
            trace!(host = %host_id, msg_type = ?m.msg_type(), "received frame");
            Some(m)
        }
        Err(e) => {
            warn!(host = %host_id, "failed to parse frame: {e}");
            None
        }
    }
}
