//! API server implementation
//!
//! Provides the channel REST endpoints and the realtime stream WebSocket.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{ApiServer, AppState};
