//! Per-channel state: members, queue, result cache and live group

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{Result, WatchPartyError};
use crate::models::{
    ChannelId, ChannelView, CreateChannelRequest, Member, MemberId, QueueAuthor, QueueItem,
    SessionId, UserView, VideoMetadata,
};
use crate::session::SessionHandle;

/// What `enqueue` does with a url that has no cached metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnqueuePolicy {
    /// Append a placeholder item that only carries the url
    #[default]
    Permissive,
    /// Reject with `NotFound`
    Strict,
}

impl EnqueuePolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Permissive
        }
    }
}

/// Mutable part of a channel, guarded by the channel lock
#[derive(Default)]
struct ChannelState {
    next_member_id: u64,
    next_item_id: u64,
    members: BTreeMap<MemberId, Member>,
    queue: Vec<QueueItem>,
    result_cache: HashMap<String, VideoMetadata>,
    sessions: HashMap<SessionId, Arc<SessionHandle>>,
    closed: bool,
}

impl ChannelState {
    fn add_member(&mut self, nickname: &str) -> Member {
        self.next_member_id += 1;
        let member = Member::new(MemberId(self.next_member_id), nickname);
        self.members.insert(member.id, member.clone());
        member
    }

    /// Remove a session entry and clear its member's connection
    fn detach(&mut self, session_id: SessionId) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.remove(&session_id)?;
        if let Some(member) = self.members.get_mut(&handle.member_id()) {
            if member.connection == Some(session_id) {
                member.connection = None;
            }
        }
        Some(handle)
    }
}

/// A watch-party channel
///
/// Shared as `Arc<Channel>`; every mutable field sits behind one lock that is
/// never held across I/O.
pub struct Channel {
    id: ChannelId,
    name: String,
    description: String,
    access_code: String,
    created_by: MemberId,
    created_at: DateTime<Utc>,
    enqueue_policy: EnqueuePolicy,
    state: RwLock<ChannelState>,
}

impl Channel {
    /// Create a channel whose creator becomes its first member
    pub fn new(
        id: ChannelId,
        spec: &CreateChannelRequest,
        access_code: String,
        enqueue_policy: EnqueuePolicy,
    ) -> Self {
        let mut state = ChannelState::default();
        let creator = state.add_member(&spec.created_by);

        Self {
            id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            access_code,
            created_by: creator.id,
            created_at: Utc::now(),
            enqueue_policy,
            state: RwLock::new(state),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_by(&self) -> MemberId {
        self.created_by
    }

    // Membership

    /// Add a member with a fresh, never reused id
    pub fn add_member(&self, nickname: &str) -> Member {
        let member = self.state.write().add_member(nickname);
        info!(channel = %self.id, member = %member.id, "Member joined");
        member
    }

    pub fn member(&self, id: MemberId) -> Option<Member> {
        self.state.read().members.get(&id).cloned()
    }

    /// Members sorted by ascending id
    pub fn members(&self) -> Vec<Member> {
        self.state.read().members.values().cloned().collect()
    }

    pub fn view(&self) -> ChannelView {
        let users = self
            .state
            .read()
            .members
            .values()
            .map(UserView::from)
            .collect();

        ChannelView {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            access_code: self.access_code.clone(),
            created_by: self.created_by,
            created_at: self.created_at,
            users,
        }
    }

    // Queue

    /// Append the item cached for `url`; returns the new queue length
    ///
    /// `added_by` is recorded only when it names a member of this channel.
    pub fn enqueue(&self, url: &str, added_by: Option<MemberId>) -> Result<usize> {
        let mut state = self.state.write();
        let meta = match state.result_cache.get(url) {
            Some(meta) => meta.clone(),
            None => match self.enqueue_policy {
                EnqueuePolicy::Permissive => {
                    debug!(channel = %self.id, url, "No cached metadata, enqueuing placeholder");
                    VideoMetadata::placeholder(url)
                }
                EnqueuePolicy::Strict => {
                    return Err(WatchPartyError::NotFound(format!(
                        "No metadata cached for {}",
                        url
                    )))
                }
            },
        };

        let author = added_by
            .and_then(|id| state.members.get(&id))
            .map(QueueAuthor::from);
        state.next_item_id += 1;
        let item = QueueItem::new(state.next_item_id, &meta, author);

        state.queue.push(item);
        Ok(state.queue.len())
    }

    /// Remove the item at `index`, keeping the order of the rest
    pub fn skip(&self, index: i64) -> Result<usize> {
        let mut state = self.state.write();
        let len = state.queue.len();
        let position = usize::try_from(index)
            .ok()
            .filter(|&i| i < len)
            .ok_or(WatchPartyError::IndexOutOfRange { index, len })?;

        state.queue.remove(position);
        Ok(state.queue.len())
    }

    /// Snapshot of the queue
    pub fn queue(&self) -> Vec<QueueItem> {
        self.state.read().queue.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.state.read().queue.len()
    }

    // Result cache

    pub fn cache_results<I>(&self, results: I)
    where
        I: IntoIterator<Item = VideoMetadata>,
    {
        let mut state = self.state.write();
        for meta in results {
            state.result_cache.insert(meta.url.clone(), meta);
        }
    }

    pub fn cached(&self, url: &str) -> Option<VideoMetadata> {
        self.state.read().result_cache.get(url).cloned()
    }

    // Live group

    /// Register a session for its member
    ///
    /// Returns the member's previous session, already closed and detached.
    pub fn attach(&self, handle: Arc<SessionHandle>) -> Result<Option<Arc<SessionHandle>>> {
        let mut state = self.state.write();
        if state.closed {
            return Err(WatchPartyError::ChannelNotFound { id: self.id });
        }

        let member_id = handle.member_id();
        let previous = match state.members.get(&member_id) {
            Some(member) => member.connection,
            None => {
                return Err(WatchPartyError::MemberNotFound {
                    channel: self.id,
                    member: member_id,
                })
            }
        };

        let replaced = previous.and_then(|id| state.detach(id));
        if let Some(old) = &replaced {
            old.close();
        }

        if let Some(member) = state.members.get_mut(&member_id) {
            member.connection = Some(handle.id());
        }
        state.sessions.insert(handle.id(), handle);

        Ok(replaced)
    }

    /// Remove a session from the live group and signal it to close
    pub fn evict(&self, session_id: SessionId) -> bool {
        let handle = self.state.write().detach(session_id);
        match handle {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Snapshot of the live group
    pub fn live_sessions(&self) -> Vec<Arc<SessionHandle>> {
        self.state.read().sessions.values().cloned().collect()
    }

    pub fn live_count(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Evict every session; with `destroy` the channel also rejects new ones
    pub fn evict_all(&self, destroy: bool) -> usize {
        let evicted: Vec<Arc<SessionHandle>> = {
            let mut state = self.state.write();
            if destroy {
                state.closed = true;
            }
            let ids: Vec<SessionId> = state.sessions.keys().copied().collect();
            ids.into_iter().filter_map(|id| state.detach(id)).collect()
        };

        for handle in &evicted {
            handle.close();
        }
        evicted.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_by", &self.created_by)
            .finish_non_exhaustive()
    }
}
