//! Persistent connection manager for remote deploy agents.
//!
//! Keeps one WebSocket link per host ID, sends periodic heartbeats,
//! reconnects with linear backoff after the link drops, and delivers
//! inbound frames on a per-host event channel.

pub mod config;
pub mod error;
pub mod manager;
mod pumps;
pub mod reconnection;
mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, ConnectionConfig};
pub use error::TransportError;
pub use manager::ConnectionManager;
pub use reconnection::ReconnectPolicy;
pub use transport::{Connector, Link, WsConnector};
pub use types::{ConnectionState, HostEvent, HostEvents};
