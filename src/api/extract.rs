//! Path extractors that reject with `WatchPartyError`
//!
//! A channel id that does not parse names a channel that cannot exist, so it
//! is reported as not found rather than as a malformed URL.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::error::{Result, WatchPartyError};
use crate::models::ChannelId;

/// `:id` segment of a channel route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPath(pub ChannelId);

/// `:id` and `:index` segments of a queue item route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueItemPath {
    pub channel: ChannelId,
    pub index: i64,
}

async fn path_params<S: Send + Sync>(parts: &mut Parts, state: &S) -> Result<HashMap<String, String>> {
    let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
        .await
        .map_err(|e| WatchPartyError::InvalidRequest(e.body_text()))?;
    Ok(params)
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| WatchPartyError::Internal(format!("route has no :{} segment", name)))
}

fn parse_channel(raw: &str) -> Result<ChannelId> {
    raw.trim()
        .parse()
        .map(ChannelId)
        .map_err(|_| WatchPartyError::NotFound(format!("channel {}", raw)))
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ChannelPath {
    type Rejection = WatchPartyError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let params = path_params(parts, state).await?;
        parse_channel(param(&params, "id")?).map(ChannelPath)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for QueueItemPath {
    type Rejection = WatchPartyError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let params = path_params(parts, state).await?;
        let channel = parse_channel(param(&params, "id")?)?;

        let raw = param(&params, "index")?;
        let index = raw
            .trim()
            .parse()
            .map_err(|_| WatchPartyError::InvalidPayload(format!("invalid queue index '{}'", raw)))?;

        Ok(Self { channel, index })
    }
}
