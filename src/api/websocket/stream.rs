//! Channel stream WebSocket handler
//!
//! Upgrades a member's request on `/stream/:id` and hands the socket to a
//! [`Session`] for the lifetime of the connection.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::extract::ChannelPath;
use crate::api::middleware::MemberIdentity;
use crate::api::server::AppState;
use crate::channel::Channel;
use crate::error::{Result, WatchPartyError};
use crate::models::MemberId;
use crate::session::{CommandSink, Frame, Session};

/// WebSocket handler for a channel's command stream
///
/// The channel and the caller's identity are checked before the upgrade so
/// that rejections are plain HTTP errors.
pub async fn stream_ws(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<impl IntoResponse> {
    let channel = state.registry.get(id)?;

    let claims = state.identity.resolve(&headers)?;
    let identity = MemberIdentity::from_claims(&claims)?;
    if identity.channel != channel.id() {
        return Err(WatchPartyError::InvalidIdentity(format!(
            "identity belongs to channel {}",
            identity.channel
        )));
    }
    if channel.member(identity.member).is_none() {
        return Err(WatchPartyError::InvalidIdentity(format!(
            "member {} is not part of channel {}",
            identity.member,
            channel.id()
        )));
    }

    let ws = ws.ok_or_else(|| {
        WatchPartyError::InvalidRequest("expected a WebSocket upgrade request".to_string())
    })?;

    let member = identity.member;
    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(channel = %id, member = %member, "WebSocket upgrade failed: {}", e);
        })
        .on_upgrade(move |socket| handle_stream_ws(socket, state, channel, member)))
}

/// Run one upgraded connection as a session
async fn handle_stream_ws(socket: WebSocket, state: AppState, channel: Arc<Channel>, member: MemberId) {
    let (sender, receiver) = socket.split();
    let sink = Arc::new(WsSink::new(sender));

    let session = match Session::open(channel.clone(), member, sink.clone(), state.session.clone()) {
        Ok(session) => session,
        Err(e) => {
            // Channel destroyed or member gone between the upgrade and now
            warn!(channel = %channel.id(), member = %member, "Session rejected: {}", e);
            sink.close().await;
            return;
        }
    };

    let inbound = receiver.map(|msg| msg.map(to_frame).map_err(WatchPartyError::from));
    let state = session.run(inbound).await;

    info!(channel = %channel.id(), member = %member, state = ?state, "Stream WebSocket disconnected");
}

/// Map a WebSocket message onto the session's frame type
fn to_frame(msg: Message) -> Frame {
    match msg {
        Message::Text(text) => Frame::Text(text),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(_) => Frame::Ping,
        Message::Pong(_) => Frame::Pong,
        Message::Close(_) => Frame::Close,
    }
}

/// Write half of an upgraded socket
///
/// The mutex serializes keepalive pings and broadcasts on one connection.
pub struct WsSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

#[async_trait]
impl CommandSink for WsSink {
    async fn send_text(&self, frame: String) -> Result<()> {
        self.sender
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(|e| WatchPartyError::Transport(e.to_string()))
    }

    async fn close(&self) {
        let _ = self.sender.lock().await.close().await;
    }
}
