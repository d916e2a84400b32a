//! Watchparty - realtime watch-party channels
//!
//! Members join a channel, share a media queue and keep playback in step by
//! broadcasting `pause`/`resume` commands over a WebSocket stream.
//!
//! ## Features
//!
//! - In-memory channel registry with access codes and member lists
//! - Shared media queue resolved against cached search results
//! - Live sessions with keepalive pings and bounded-time broadcast
//! - Signed identity cookies issued on create and join

pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod session;

pub use channel::ChannelRegistry;
pub use config::Config;
pub use error::{Result, WatchPartyError};
