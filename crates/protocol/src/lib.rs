pub mod constants;
pub mod endpoint;
pub mod envelope;

// Re-export primary types for convenience.
pub use constants::FrameKind;
pub use endpoint::{Origin, OriginError};
pub use envelope::Message;
