use std::time::Duration;

/// Path prefix of the agent WebSocket endpoint. The credential is appended.
pub const AGENT_WS_PATH: &str = "/api/ws/agent/";

/// How often a heartbeat frame is sent while a link is open.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// Base delay for reconnect backoff. Attempt `n` waits `n * RECONNECT_BASE_DELAY`.
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(3);

/// Consecutive failed reconnects tolerated before a session goes quiescent.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Time allowed to flush the close frame when a link is torn down.
pub const WS_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximum inbound frame size in bytes (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Value of the `type` discriminator on heartbeat frames.
pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// Frame classification. Only the `type` discriminator is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Keepalive frame (`"type": "heartbeat"`).
    Heartbeat,
    /// Anything else, passed through to the caller untouched.
    Application,
}
