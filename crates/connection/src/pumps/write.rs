//! Write pump: serialises outbound frames onto the link.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use hostlink_protocol::constants::WS_WRITE_WAIT;

use crate::error::TransportError;

/// Writes queued frames until cancelled or the queue closes, then sends a
/// close frame.
///
/// Each write is bounded by `WS_WRITE_WAIT` and raced against
/// `link_cancel`, so a peer that stops reading cannot pin the pump. A
/// failed or expired write cancels `link_cancel` and is returned; no close
/// frame is attempted on a sink that already failed.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    link_cancel: CancellationToken,
) -> Result<(), TransportError>
where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = link_cancel.cancelled() => break,
            msg = write_rx.recv() => match msg {
                Some(m) => m,
                None => break,
            },
        };

        let written = tokio::select! {
            biased;
            _ = link_cancel.cancelled() => break,
            r = tokio::time::timeout(WS_WRITE_WAIT, write.send(msg)) => r,
        };

        let err = match written {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => {
                warn!("WebSocket write error: {e}");
                TransportError::from(e)
            }
            Err(_) => {
                warn!("WebSocket write stalled for {WS_WRITE_WAIT:?}");
                TransportError::WriteTimeout(WS_WRITE_WAIT)
            }
        };
        link_cancel.cancel();
        return Err(err);
    }

    match tokio::time::timeout(WS_WRITE_WAIT, write.send(tungstenite::Message::Close(None))).await
    {
        Ok(Ok(())) => trace!("close frame sent"),
        Ok(Err(e)) => trace!("close frame not sent: {e}"),
        Err(_) => warn!("timed out sending close frame"),
    }
    Ok(())
}
