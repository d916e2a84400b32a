pub mod channel;
pub mod media;

pub use channel::*;
pub use media::*;

/// Status string carried by successful JSON responses
pub const STATUS_OK: &str = "ok";
