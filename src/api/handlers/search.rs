//! Metadata search handler

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use tracing::debug;

use crate::api::extract::ChannelPath;
use crate::api::server::AppState;
use crate::error::WatchPartyError;
use crate::models::{SearchQuery, SearchResponse, STATUS_OK};

/// Search the metadata provider and cache the hits on the channel
pub async fn search(
    State(state): State<AppState>,
    ChannelPath(id): ChannelPath,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, WatchPartyError> {
    let channel = state.registry.get(id)?;

    let q = query.q.trim();
    if q.is_empty() {
        return Err(WatchPartyError::InvalidRequest("query 'q' is required".to_string()));
    }

    let results = state.catalog.search(q).await?;
    channel.cache_results(results.iter().cloned());

    debug!(
        channel = %channel.id(),
        provider = state.catalog.provider_name(),
        hits = results.len(),
        "Cached search results"
    );

    Ok(Json(SearchResponse {
        status: STATUS_OK.to_string(),
        count: results.len(),
        results,
    }))
}
