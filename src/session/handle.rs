//! Outbound side of a live session

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::error::Result;
use crate::models::{MemberId, SessionId};

/// Write half of a session transport
///
/// The WebSocket adapter implements this for real connections.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Write one text frame
    async fn send_text(&self, frame: String) -> Result<()>;

    /// Close the underlying connection
    async fn close(&self);
}

/// Result of delivering one frame to one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
    TimedOut,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            DeliveryOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Entry of a channel's live broadcast group
///
/// Closing the handle signals the owning session task to shut down.
pub struct SessionHandle {
    id: SessionId,
    member_id: MemberId,
    sink: Arc<dyn CommandSink>,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionHandle {
    pub fn new(member_id: MemberId, sink: Arc<dyn CommandSink>) -> (Arc<Self>, watch::Receiver<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Self {
            id: SessionId::new(),
            member_id,
            sink,
            shutdown_tx,
        };
        (Arc::new(handle), shutdown_rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    /// Write a frame, giving up after `deadline`
    pub async fn deliver(&self, frame: String, deadline: Duration) -> DeliveryOutcome {
        match timeout(deadline, self.sink.send_text(frame)).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(e)) => DeliveryOutcome::Failed(e.to_string()),
            Err(_) => DeliveryOutcome::TimedOut,
        }
    }

    /// Signal the session task to stop
    pub fn close(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Close the transport, bounded by `deadline`
    pub async fn close_sink(&self, deadline: Duration) {
        let _ = timeout(deadline, self.sink.close()).await;
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("member_id", &self.member_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
