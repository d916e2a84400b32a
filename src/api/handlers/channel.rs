//! Channel and membership handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::api::extract::ChannelPath;
use crate::api::middleware::MemberIdentity;
use crate::api::server::AppState;
use crate::error::WatchPartyError;
use crate::models::{AddMemberRequest, CreateChannelRequest, UserView};

/// Create a channel; the caller becomes its first member
pub async fn create_channel(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<CreateChannelRequest>, JsonRejection>,
) -> Result<impl IntoResponse, WatchPartyError> {
    let Json(req) = payload.map_err(|e| WatchPartyError::InvalidRequest(e.body_text()))?;
    req.validate().map_err(WatchPartyError::InvalidRequest)?;

    let req = CreateChannelRequest {
        name: req.name.trim().to_string(),
        description: req.description.trim().to_string(),
        created_by: req.created_by.trim().to_string(),
    };
    let channel = state.registry.create(&req);
    let jar = state
        .identity
        .remember(jar, channel.id(), channel.created_by())?;

    Ok((jar, Json(channel.view())))
}

/// Get a channel with its members
pub async fn get_channel(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
) -> Result<impl IntoResponse, WatchPartyError> {
    let channel = state.registry.get(id)?;
    Ok(Json(channel.view()))
}

/// Destroy a channel; only its creator may do so
pub async fn delete_channel(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
    identity: MemberIdentity,
) -> Result<impl IntoResponse, WatchPartyError> {
    let channel = state.registry.get(id)?;

    if identity.channel != channel.id() || identity.member != channel.created_by() {
        return Err(WatchPartyError::Forbidden(
            "only the channel creator can delete it".to_string(),
        ));
    }

    state.registry.remove(channel.id())?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join a channel as a new member
pub async fn add_member(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
    jar: CookieJar,
    payload: Result<Json<AddMemberRequest>, JsonRejection>,
) -> Result<impl IntoResponse, WatchPartyError> {
    let Json(req) = payload.map_err(|e| WatchPartyError::InvalidRequest(e.body_text()))?;
    req.validate().map_err(WatchPartyError::InvalidRequest)?;

    let channel = state.registry.get(id)?;
    let member = channel.add_member(req.nickname.trim());
    let jar = state.identity.remember(jar, channel.id(), member.id)?;

    info!(channel = %channel.id(), member = %member.id, nickname = %member.nickname, "Issued identity");

    Ok((jar, Json(channel.view())))
}

/// List members sorted by id
pub async fn list_members(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
) -> Result<impl IntoResponse, WatchPartyError> {
    let channel = state.registry.get(id)?;
    let users: Vec<UserView> = channel.members().iter().map(UserView::from).collect();
    Ok(Json(users))
}
