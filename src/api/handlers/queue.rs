//! Queue handlers

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use crate::api::extract::{ChannelPath, QueueItemPath};
use crate::api::middleware::MemberIdentity;
use crate::api::server::AppState;
use crate::channel::Channel;
use crate::error::WatchPartyError;
use crate::models::{EnqueueRequest, QueueMutationResponse, QueueResponse, STATUS_OK};
use crate::session::{broadcast, Command};

/// List the queue
pub async fn list_queue(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
) -> Result<impl IntoResponse, WatchPartyError> {
    let channel = state.registry.get(id)?;
    let queue = channel.queue();

    Ok(Json(QueueResponse {
        status: STATUS_OK.to_string(),
        length: queue.len(),
        queue,
    }))
}

/// Append a url to the queue
///
/// The caller's identity is optional; when it belongs to this channel the
/// item records its author.
pub async fn enqueue(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
    identity: Option<MemberIdentity>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<impl IntoResponse, WatchPartyError> {
    let channel = state.registry.get(id)?;

    let Json(req) = payload.map_err(|e| WatchPartyError::InvalidPayload(e.body_text()))?;
    let url = req.url.trim();
    if url.is_empty() {
        return Err(WatchPartyError::InvalidPayload("url is required".to_string()));
    }

    let added_by = identity
        .filter(|identity| identity.channel == channel.id())
        .map(|identity| identity.member);
    let length = channel.enqueue(url, added_by)?;
    info!(channel = %channel.id(), url, length, "Enqueued item");

    notify_queue_updated(&state, channel);

    Ok(Json(QueueMutationResponse {
        status: STATUS_OK.to_string(),
        length,
    }))
}

/// Remove the item at `index`
pub async fn skip(
    State(state): State<AppState>,
    path: QueueItemPath,
) -> Result<impl IntoResponse, WatchPartyError> {
    let channel = state.registry.get(path.channel)?;
    let length = channel.skip(path.index)?;
    info!(channel = %channel.id(), index = path.index, length, "Skipped item");

    notify_queue_updated(&state, channel);

    Ok(Json(QueueMutationResponse {
        status: STATUS_OK.to_string(),
        length,
    }))
}

/// Tell live sessions the queue changed without holding up the response
fn notify_queue_updated(state: &AppState, channel: Arc<Channel>) {
    let deadline = state.session.write_deadline;
    tokio::spawn(async move {
        broadcast(&channel, Command::QueueUpdated, deadline).await;
    });
}
