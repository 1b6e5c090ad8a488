//! Transport seam between sessions and the network.
//!
//! A [`Connector`] opens one [`Link`] per call. Production code uses
//! [`WsConnector`]; tests plug in a channel-backed connector so they can
//! script failures and drive virtual time.

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite;

use hostlink_protocol::constants::MAX_FRAME_SIZE;

use crate::error::TransportError;

/// Write half of an open link.
pub type FrameSink = Pin<Box<dyn Sink<tungstenite::Message, Error = tungstenite::Error> + Send>>;

/// Read half of an open link.
pub type FrameStream =
    Pin<Box<dyn Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send>>;

/// An open duplex channel to one agent.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Link {
    pub fn new<W, R>(sink: W, stream: R) -> Self
    where
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Send + 'static,
        R: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

/// Opens links to agent endpoints.
pub trait Connector: Send + Sync + 'static {
    /// Opens a link to `url`. Resolves once the handshake completes.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    max_frame_size: usize,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl WsConnector {
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, TransportError>> {
        let url = url.to_string();
        let max = self.max_frame_size;
        Box::pin(async move {
            let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
            ws_config.max_message_size = Some(max);
            ws_config.max_frame_size = Some(max);
            let (ws_stream, _) =
                tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false)
                    .await
                    .map_err(TransportError::from_handshake)?;
            let (write, read) = ws_stream.split();
            Ok(Link::new(write, read))
        })
    }
}
