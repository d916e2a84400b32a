//! Live sessions and the broadcast protocol
//!
//! A session binds one duplex connection to one member of one channel. The
//! transport is abstracted behind [`CommandSink`] (writes) and a stream of
//! [`Frame`]s (reads), so the WebSocket adapter lives in the API layer.

pub mod broadcast;
pub mod connection;
pub mod handle;
pub mod protocol;

pub use broadcast::{broadcast, BroadcastReport, Delivery};
pub use connection::{Session, SessionConfig, SessionState};
pub use handle::{CommandSink, DeliveryOutcome, SessionHandle};
pub use protocol::{Command, Frame, Inbound};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::CommandSink;
    use crate::error::{Result, WatchPartyError};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        Healthy,
        Broken,
        Hung,
    }

    /// In-memory sink that records frames and can be made to fail
    pub(crate) struct RecordingSink {
        behavior: Mutex<Behavior>,
        frames: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl RecordingSink {
        fn with(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior: Mutex::new(behavior),
                frames: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            })
        }

        pub(crate) fn healthy() -> Arc<Self> {
            Self::with(Behavior::Healthy)
        }

        pub(crate) fn broken() -> Arc<Self> {
            Self::with(Behavior::Broken)
        }

        /// Writes never complete
        pub(crate) fn hung() -> Arc<Self> {
            Self::with(Behavior::Hung)
        }

        /// Make every later write fail
        pub(crate) fn sever(&self) {
            *self.behavior.lock() = Behavior::Broken;
        }

        pub(crate) fn frames(&self) -> Vec<String> {
            self.frames.lock().clone()
        }

        pub(crate) fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send_text(&self, frame: String) -> Result<()> {
            let behavior = *self.behavior.lock();
            match behavior {
                Behavior::Healthy => {
                    self.frames.lock().push(frame);
                    Ok(())
                }
                Behavior::Broken => Err(WatchPartyError::Transport("connection reset".to_string())),
                Behavior::Hung => futures::future::pending().await,
            }
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Poll `condition` until it holds, failing the test after two seconds
    pub(crate) async fn wait_until<F>(condition: F)
    where
        F: Fn() -> bool,
    {
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "condition not reached in time");
    }
}
