//! Process-wide channel registry

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use super::state::{Channel, EnqueuePolicy};
use crate::error::{Result, WatchPartyError};
use crate::models::{ChannelId, CreateChannelRequest};

/// Shortest access code handed out
pub const MIN_ACCESS_CODE_LENGTH: usize = 5;

/// Registry settings
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub access_code_length: usize,
    pub enqueue_policy: EnqueuePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            access_code_length: 6,
            enqueue_policy: EnqueuePolicy::Permissive,
        }
    }
}

/// Owns every channel and vends shared handles to them
///
/// Ids come from an atomic counter and are never reused, even after removal.
pub struct ChannelRegistry {
    channels: DashMap<ChannelId, Arc<Channel>>,
    next_id: AtomicU64,
    config: RegistryConfig,
}

impl ChannelRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Create a channel and register it under a fresh id
    pub fn create(&self, spec: &CreateChannelRequest) -> Arc<Channel> {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let access_code = generate_access_code(self.config.access_code_length);
        let channel = Arc::new(Channel::new(
            id,
            spec,
            access_code,
            self.config.enqueue_policy,
        ));

        self.channels.insert(id, channel.clone());
        info!(channel = %id, name = %channel.name(), "Channel created");

        channel
    }

    pub fn get(&self, id: ChannelId) -> Result<Arc<Channel>> {
        self.channels
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(WatchPartyError::ChannelNotFound { id })
    }

    /// Unlink a channel and evict all of its sessions
    pub fn remove(&self, id: ChannelId) -> Result<Arc<Channel>> {
        let (_, channel) = self
            .channels
            .remove(&id)
            .ok_or(WatchPartyError::ChannelNotFound { id })?;

        let evicted = channel.evict_all(true);
        info!(channel = %id, evicted, "Channel removed");

        Ok(channel)
    }

    /// Evict every live session of every channel
    pub fn shutdown(&self) -> usize {
        let channels: Vec<Arc<Channel>> = self
            .channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let evicted = channels.iter().map(|c| c.evict_all(false)).sum();
        info!(channels = channels.len(), evicted, "Evicted all sessions");
        evicted
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// Random alphanumeric access code; cosmetic, not a secret
pub fn generate_access_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length.max(MIN_ACCESS_CODE_LENGTH))
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberId;
    use crate::session::testing::RecordingSink;
    use crate::session::SessionHandle;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    fn spec(name: &str) -> CreateChannelRequest {
        CreateChannelRequest {
            name: name.to_string(),
            description: String::new(),
            created_by: "alice".to_string(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = ChannelRegistry::default();
        let channel = registry.create(&spec("Movie Night"));

        assert_eq!(channel.id(), ChannelId(1));
        assert_eq!(channel.created_by(), MemberId(1));
        assert_eq!(registry.len(), 1);

        let fetched = registry.get(channel.id()).unwrap();
        assert!(Arc::ptr_eq(&channel, &fetched));
    }

    #[test]
    fn test_get_missing_channel() {
        let registry = ChannelRegistry::default();
        let err = registry.get(ChannelId(42)).unwrap_err();
        assert!(matches!(err, WatchPartyError::ChannelNotFound { id } if id == ChannelId(42)));
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let registry = ChannelRegistry::default();
        let first = registry.create(&spec("one"));
        let second = registry.create(&spec("two"));
        registry.remove(first.id()).unwrap();

        let third = registry.create(&spec("three"));
        assert_ne!(third.id(), first.id());
        assert_ne!(third.id(), second.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_mutation_through_handle_is_visible_to_all_lookups() {
        let registry = ChannelRegistry::default();
        let id = registry.create(&spec("shared")).id();

        registry.get(id).unwrap().add_member("bob");
        registry.get(id).unwrap().enqueue("v1", None).unwrap();

        let channel = registry.get(id).unwrap();
        assert_eq!(channel.members().len(), 2);
        assert_eq!(channel.queue_len(), 1);
    }

    #[test]
    fn test_concurrent_creates_get_unique_ids() {
        let registry = Arc::new(ChannelRegistry::default());
        let threads: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.create(&spec(&format!("c{}", i))).id())
            })
            .collect();

        let ids: HashSet<ChannelId> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(ids.len(), 32);
        assert_eq!(registry.len(), 32);
    }

    #[test]
    fn test_remove_evicts_sessions_first() {
        let registry = ChannelRegistry::default();
        let channel = registry.create(&spec("doomed"));
        let (handle, _rx) = SessionHandle::new(MemberId(1), RecordingSink::healthy());
        channel.attach(handle.clone()).unwrap();

        let removed = registry.remove(channel.id()).unwrap();
        assert!(handle.is_closed());
        assert_eq!(removed.live_count(), 0);
        assert!(registry.get(channel.id()).is_err());
        assert!(matches!(
            registry.remove(channel.id()),
            Err(WatchPartyError::ChannelNotFound { .. })
        ));
    }

    #[test]
    fn test_shutdown_evicts_without_destroying() {
        let registry = ChannelRegistry::default();
        let channel = registry.create(&spec("night"));
        let (handle, _rx) = SessionHandle::new(MemberId(1), RecordingSink::healthy());
        channel.attach(handle.clone()).unwrap();

        assert_eq!(registry.shutdown(), 1);
        assert!(handle.is_closed());
        assert!(!channel.is_closed());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_access_code_length() {
        assert_eq!(generate_access_code(8).len(), 8);
        assert_eq!(generate_access_code(1).len(), MIN_ACCESS_CODE_LENGTH);
        assert!(generate_access_code(12).chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_concurrent_enqueue_and_skip_are_linearized() {
        let registry = Arc::new(ChannelRegistry::default());
        let id = registry.create(&spec("busy")).id();

        let enqueues = 64;
        let skips = 32;
        let barrier = Arc::new(Barrier::new(enqueues + skips + 1));
        let skipped = Arc::new(AtomicUsize::new(0));

        let mut threads = Vec::new();
        for i in 0..enqueues {
            let (registry, barrier) = (registry.clone(), barrier.clone());
            threads.push(std::thread::spawn(move || {
                barrier.wait();
                registry
                    .get(id)
                    .unwrap()
                    .enqueue(&format!("v{}", i), None)
                    .unwrap();
            }));
        }
        for _ in 0..skips {
            let (registry, barrier, skipped) = (registry.clone(), barrier.clone(), skipped.clone());
            threads.push(std::thread::spawn(move || {
                barrier.wait();
                if registry.get(id).unwrap().skip(0).is_ok() {
                    skipped.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        // Appends take the next item id and skip(0) drops the oldest, so any
        // consistent snapshot is a contiguous ascending run of ids.
        let reader = {
            let (registry, barrier) = (registry.clone(), barrier.clone());
            std::thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    let queue = registry.get(id).unwrap().queue();
                    assert!(queue.len() <= enqueues);
                    for pair in queue.windows(2) {
                        assert_eq!(pair[1].id, pair[0].id + 1);
                    }
                }
            })
        };

        for t in threads {
            t.join().unwrap();
        }
        reader.join().unwrap();

        let skipped = skipped.load(Ordering::SeqCst);
        let channel = registry.get(id).unwrap();
        assert_eq!(channel.queue_len(), enqueues - skipped);

        let ids: Vec<u64> = channel.queue().iter().map(|i| i.id).collect();
        let expected: Vec<u64> = ((skipped as u64 + 1)..=(enqueues as u64)).collect();
        assert_eq!(ids, expected);
    }
}
