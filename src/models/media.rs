use serde::{Deserialize, Serialize};

use super::channel::{Member, MemberId};

/// Media metadata resolved by a metadata provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: String,
    /// Duration in seconds
    #[serde(default)]
    pub duration: u64,
}

impl VideoMetadata {
    /// Metadata for a url nothing is known about
    pub fn placeholder(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

/// Member who added a queue item, as of the time it was added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAuthor {
    pub id: MemberId,
    pub nickname: String,
}

impl From<&Member> for QueueAuthor {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            nickname: member.nickname.clone(),
        }
    }
}

/// One entry of a channel's playback queue
///
/// Items are immutable once enqueued. `id` is unique within the channel and
/// never reused; removal is still addressed by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: u64,
    pub url: String,
    pub title: String,
    pub thumbnail_url: String,
    pub duration: u64,
    /// `None` when the request carried no identity for this channel
    pub added_by: Option<QueueAuthor>,
}

impl QueueItem {
    pub fn new(id: u64, meta: &VideoMetadata, added_by: Option<QueueAuthor>) -> Self {
        Self {
            id,
            url: meta.url.clone(),
            title: meta.title.clone(),
            thumbnail_url: meta.thumbnail_url.clone(),
            duration: meta.duration,
            added_by,
        }
    }
}

/// Request to append a url to the queue
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    pub url: String,
}

/// Queue listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    pub status: String,
    pub length: usize,
    pub queue: Vec<QueueItem>,
}

/// Response to a queue mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMutationResponse {
    pub status: String,
    pub length: usize,
}

/// Search query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: String,
    pub count: usize,
    pub results: Vec<VideoMetadata>,
}
