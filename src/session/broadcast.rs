//! Fan-out of command frames to a channel's live group
//!
//! Every recipient is attempted regardless of earlier failures. Failed
//! recipients are evicted only after all deliveries have settled.

use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::handle::DeliveryOutcome;
use super::protocol::{self, Command};
use crate::channel::Channel;
use crate::models::{MemberId, SessionId};

/// Outcome of one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub session_id: SessionId,
    pub member_id: MemberId,
    pub outcome: DeliveryOutcome,
}

/// Per-recipient outcomes of one broadcast
#[derive(Debug, Clone)]
pub struct BroadcastReport {
    pub command: Command,
    pub deliveries: Vec<Delivery>,
}

impl BroadcastReport {
    pub fn delivered_count(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.outcome.is_delivered())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries.len() - self.delivered_count()
    }

    /// Sessions evicted because delivery failed
    pub fn evicted(&self) -> Vec<SessionId> {
        self.deliveries
            .iter()
            .filter(|d| !d.outcome.is_delivered())
            .map(|d| d.session_id)
            .collect()
    }
}

/// Send `command` to every live session of `channel`
pub async fn broadcast(channel: &Channel, command: Command, write_deadline: Duration) -> BroadcastReport {
    let recipients = channel.live_sessions();
    if recipients.is_empty() {
        debug!(channel = %channel.id(), %command, "No live sessions to broadcast to");
        return BroadcastReport {
            command,
            deliveries: Vec::new(),
        };
    }

    let frame = protocol::encode(command);
    let concurrency = recipients.len();

    let deliveries = futures::stream::iter(recipients)
        .map(|handle| {
            let frame = frame.clone();
            async move {
                let outcome = handle.deliver(frame, write_deadline).await;
                Delivery {
                    session_id: handle.id(),
                    member_id: handle.member_id(),
                    outcome,
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<Delivery>>()
        .await;

    for delivery in deliveries.iter().filter(|d| !d.outcome.is_delivered()) {
        warn!(
            channel = %channel.id(),
            member = %delivery.member_id,
            session = %delivery.session_id,
            outcome = %delivery.outcome,
            "Broadcast delivery failed, evicting session"
        );
        channel.evict(delivery.session_id);
    }

    let report = BroadcastReport {
        command,
        deliveries,
    };

    info!(
        channel = %channel.id(),
        %command,
        delivered = report.delivered_count(),
        evicted = report.failed_count(),
        "Broadcast complete"
    );

    report
}
