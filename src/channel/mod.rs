//! Channels and the registry that owns them

mod registry;
mod state;

pub use registry::{generate_access_code, ChannelRegistry, RegistryConfig, MIN_ACCESS_CODE_LENGTH};
pub use state::{Channel, EnqueuePolicy};
