//! Per-link tasks moving frames between a transport and its session.

pub(crate) mod heartbeat;
pub(crate) mod read;
pub(crate) mod write;
