//! API request handlers

pub mod channel;
pub mod health;
pub mod queue;
pub mod search;
