//! Session lifecycle: Connecting -> Active -> Closing
//!
//! An active session runs a read loop over inbound frames and a keepalive
//! task that writes a ping frame on a fixed interval. The first of the two to
//! fail, or an eviction from the channel, closes the session.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

use super::broadcast::broadcast;
use super::handle::{CommandSink, SessionHandle};
use super::protocol::{self, Command, Frame, Inbound};
use crate::channel::Channel;
use crate::error::{Result, WatchPartyError};
use crate::models::{MemberId, SessionId};

/// Session timing
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between keepalive pings
    pub keepalive_interval: Duration,
    /// Upper bound for any single outbound write
    pub write_deadline: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(10),
            write_deadline: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
}

/// One member's live connection to a channel
pub struct Session {
    channel: Arc<Channel>,
    handle: Arc<SessionHandle>,
    shutdown_rx: watch::Receiver<bool>,
    config: SessionConfig,
    state: SessionState,
}

impl Session {
    /// Bind `sink` to a member and join the channel's live group
    ///
    /// Fails when the channel was destroyed or the member does not exist.
    pub fn open(
        channel: Arc<Channel>,
        member_id: MemberId,
        sink: Arc<dyn CommandSink>,
        config: SessionConfig,
    ) -> Result<Self> {
        let (handle, shutdown_rx) = SessionHandle::new(member_id, sink);
        debug!(
            channel = %channel.id(),
            member = %member_id,
            session = %handle.id(),
            state = ?SessionState::Connecting,
            "Opening session"
        );

        if let Some(previous) = channel.attach(handle.clone())? {
            info!(
                channel = %channel.id(),
                member = %member_id,
                session = %previous.id(),
                "Replaced previous session of member"
            );
        }

        info!(
            channel = %channel.id(),
            member = %member_id,
            session = %handle.id(),
            "Session active"
        );

        Ok(Self {
            channel,
            handle,
            shutdown_rx,
            config,
            state: SessionState::Active,
        })
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until the peer leaves, a write fails or it is evicted
    #[instrument(
        skip_all,
        fields(channel = %self.channel.id(), member = %self.handle.member_id(), session = %self.handle.id())
    )]
    pub async fn run<S>(self, mut inbound: S) -> SessionState
    where
        S: Stream<Item = Result<Frame>> + Unpin + Send,
    {
        let Session {
            channel,
            handle,
            mut shutdown_rx,
            config,
            ..
        } = self;

        let mut keepalive = tokio::spawn(keepalive(handle.clone(), config.clone()));

        let reason = loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break "evicted";
                    }
                }
                _ = &mut keepalive => break "keepalive failed",
                frame = inbound.next() => match frame {
                    Some(Ok(frame)) => {
                        if !dispatch(&channel, frame, &config).await {
                            break "closed by peer";
                        }
                    }
                    Some(Err(e)) => {
                        debug!("Session read failed: {}", e);
                        break "read failed";
                    }
                    None => break "connection closed",
                },
            }
        };

        // Closing
        keepalive.abort();
        channel.evict(handle.id());
        handle.close_sink(config.write_deadline).await;

        info!(reason, "Session closed");
        SessionState::Closing
    }
}

/// Handle one inbound frame; returns false when the session should end
async fn dispatch(channel: &Channel, frame: Frame, config: &SessionConfig) -> bool {
    match protocol::classify(frame) {
        Inbound::Broadcast(command) => {
            debug!(%command, "Member command received");
            broadcast(channel, command, config.write_deadline).await;
            true
        }
        Inbound::Control => true,
        Inbound::Deviation(reason) => {
            let deviation = WatchPartyError::ProtocolDeviation(reason);
            warn!("{}, frame ignored", deviation);
            true
        }
        Inbound::Close => false,
    }
}

/// Write a ping every interval until a write fails
async fn keepalive(handle: Arc<SessionHandle>, config: SessionConfig) {
    let mut ticker = interval(config.keepalive_interval);
    ticker.tick().await; // first tick completes immediately

    let frame = protocol::encode(Command::Ping);
    loop {
        ticker.tick().await;

        let outcome = handle.deliver(frame.clone(), config.write_deadline).await;
        if !outcome.is_delivered() {
            warn!(session = %handle.id(), %outcome, "Keepalive ping failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EnqueuePolicy;
    use crate::error::WatchPartyError;
    use crate::models::{ChannelId, CreateChannelRequest};
    use crate::session::testing::{wait_until, RecordingSink};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    const PAUSE: &str = r#"{"command":"pause"}"#;
    const PING: &str = r#"{"command":"ping"}"#;

    fn movie_night() -> Arc<Channel> {
        let spec = CreateChannelRequest {
            name: "Movie Night".to_string(),
            description: String::new(),
            created_by: "alice".to_string(),
        };
        Arc::new(Channel::new(
            ChannelId(1),
            &spec,
            "abcde".to_string(),
            EnqueuePolicy::Permissive,
        ))
    }

    fn quiet_config() -> SessionConfig {
        SessionConfig {
            keepalive_interval: Duration::from_secs(3600),
            write_deadline: Duration::from_millis(100),
        }
    }

    /// Open a session and spawn its run loop; returns the inbound sender
    fn spawn_session(
        channel: &Arc<Channel>,
        member: MemberId,
        sink: Arc<RecordingSink>,
        config: SessionConfig,
    ) -> (
        SessionId,
        mpsc::Sender<Result<Frame>>,
        tokio::task::JoinHandle<SessionState>,
    ) {
        let session = Session::open(channel.clone(), member, sink, config).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        let id = session.id();

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(session.run(ReceiverStream::new(rx)));
        (id, tx, task)
    }

    #[tokio::test]
    async fn test_open_fails_for_unknown_member() {
        let channel = movie_night();
        let result = Session::open(
            channel.clone(),
            MemberId(5),
            RecordingSink::healthy(),
            quiet_config(),
        );
        assert!(matches!(result, Err(WatchPartyError::MemberNotFound { .. })));
        assert_eq!(channel.live_count(), 0);
    }

    #[tokio::test]
    async fn test_open_fails_for_destroyed_channel() {
        let channel = movie_night();
        channel.evict_all(true);
        let result = Session::open(
            channel,
            MemberId(1),
            RecordingSink::healthy(),
            quiet_config(),
        );
        assert!(matches!(result, Err(WatchPartyError::ChannelNotFound { .. })));
    }

    #[tokio::test]
    async fn test_movie_night_scenario() {
        let channel = movie_night();
        let bob = channel.add_member("bob");
        assert_eq!(channel.created_by(), MemberId(1));
        assert_eq!(bob.id, MemberId(2));

        channel.cache_results(vec![crate::models::VideoMetadata {
            url: "v1".to_string(),
            title: "Clip A".to_string(),
            thumbnail_url: String::new(),
            duration: 30,
        }]);
        channel.enqueue("v1", Some(MemberId(1))).unwrap();
        assert_eq!(channel.queue()[0].title, "Clip A");
        assert_eq!(channel.skip(0).unwrap(), 0);
        assert!(channel.queue().is_empty());

        let alice_sink = RecordingSink::healthy();
        let bob_sink = RecordingSink::healthy();
        let (_alice_id, alice_tx, alice_task) =
            spawn_session(&channel, MemberId(1), alice_sink.clone(), quiet_config());
        let (_bob_id, _bob_tx, bob_task) =
            spawn_session(&channel, bob.id, bob_sink.clone(), quiet_config());
        assert_eq!(channel.live_count(), 2);

        // Sever bob's connection, then alice pauses
        bob_sink.sever();
        alice_tx.send(Ok(Frame::Text("pause".to_string()))).await.unwrap();

        wait_until(|| alice_sink.frames().contains(&PAUSE.to_string())).await;
        assert_eq!(bob_task.await.unwrap(), SessionState::Closing);
        assert_eq!(channel.live_count(), 1);
        assert!(!channel.member(bob.id).unwrap().is_online());
        assert!(channel.member(MemberId(1)).unwrap().is_online());

        drop(alice_tx);
        assert_eq!(alice_task.await.unwrap(), SessionState::Closing);
        assert_eq!(channel.live_count(), 0);
    }

    #[tokio::test]
    async fn test_deviations_do_not_close_session() {
        let channel = movie_night();
        let sink = RecordingSink::healthy();
        let (_id, tx, task) = spawn_session(&channel, MemberId(1), sink.clone(), quiet_config());

        tx.send(Ok(Frame::Binary(vec![0xde, 0xad]))).await.unwrap();
        tx.send(Ok(Frame::Text("ping".to_string()))).await.unwrap();
        tx.send(Ok(Frame::Text("rewind".to_string()))).await.unwrap();
        tx.send(Ok(Frame::Ping)).await.unwrap();
        tx.send(Ok(Frame::Text(r#"{"command":"resume"}"#.to_string())))
            .await
            .unwrap();

        wait_until(|| sink.frames() == vec![r#"{"command":"resume"}"#.to_string()]).await;
        assert_eq!(channel.live_count(), 1);

        tx.send(Ok(Frame::Close)).await.unwrap();
        assert_eq!(task.await.unwrap(), SessionState::Closing);
        assert_eq!(channel.live_count(), 0);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_read_error_closes_session() {
        let channel = movie_night();
        let (_id, tx, task) =
            spawn_session(&channel, MemberId(1), RecordingSink::healthy(), quiet_config());

        tx.send(Err(WatchPartyError::Transport("reset".to_string())))
            .await
            .unwrap();
        assert_eq!(task.await.unwrap(), SessionState::Closing);
        assert_eq!(channel.live_count(), 0);
    }

    #[tokio::test]
    async fn test_keepalive_pings_then_closes_on_failure() {
        let channel = movie_night();
        let sink = RecordingSink::healthy();
        let config = SessionConfig {
            keepalive_interval: Duration::from_millis(20),
            write_deadline: Duration::from_millis(100),
        };
        let (_id, _tx, task) = spawn_session(&channel, MemberId(1), sink.clone(), config);

        wait_until(|| sink.frames().iter().filter(|f| f.as_str() == PING).count() >= 2).await;
        assert_eq!(channel.live_count(), 1);

        sink.sever();
        assert_eq!(task.await.unwrap(), SessionState::Closing);
        assert_eq!(channel.live_count(), 0);
    }

    #[tokio::test]
    async fn test_eviction_stops_session() {
        let channel = movie_night();
        let (id, _tx, task) =
            spawn_session(&channel, MemberId(1), RecordingSink::healthy(), quiet_config());

        assert!(channel.evict(id));
        assert_eq!(task.await.unwrap(), SessionState::Closing);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_previous_session() {
        let channel = movie_night();
        let (first, _tx1, first_task) =
            spawn_session(&channel, MemberId(1), RecordingSink::healthy(), quiet_config());
        let (second, _tx2, _second_task) =
            spawn_session(&channel, MemberId(1), RecordingSink::healthy(), quiet_config());

        assert_eq!(first_task.await.unwrap(), SessionState::Closing);
        assert_ne!(first, second);
        assert_eq!(channel.live_count(), 1);
        assert_eq!(channel.member(MemberId(1)).unwrap().connection, Some(second));
    }
}
