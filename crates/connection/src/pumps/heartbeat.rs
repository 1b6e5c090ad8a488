//! Heartbeat pump: periodic keepalive frames.
//!
//! The heartbeat is one-way: the agent is not expected to answer it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hostlink_protocol::Message;

/// Sends a heartbeat immediately, then once per `period`.
///
/// Never waits on the write queue: a tick that finds it full is skipped.
/// Exits when cancelled or when the write queue is gone.
pub(crate) async fn heartbeat_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    cancel: CancellationToken,
) {
    // First tick completes immediately.
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let frame = match Message::heartbeat_now().encode() {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("failed to encode heartbeat: {e}");
                        continue;
                    }
                };
                match write_tx.try_send(tungstenite::Message::Text(frame.into())) {
                    Ok(()) => trace!("heartbeat sent"),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("write queue full, skipping heartbeat");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("write path closed, stopping heartbeat");
                        break;
                    }
                }
            }
        }
    }
}
