//! Group subscriptions

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

use crate::error::{Error, Result};
use crate::group::GroupId;
use crate::stats::Counter;

use super::message::Message;

/// A live feed of one group's messages
///
/// Yields messages published after the subscription was created, in publish
/// order. Dropping it cancels the feed and frees its buffer.
pub struct Subscription {
    group: GroupId,
    rx: Receiver<Arc<Message>>,
    ttl: Duration,
    dropped: u64,
    lagged: Arc<Counter>,
}

impl Subscription {
    pub(super) fn new(
        group: GroupId,
        rx: Receiver<Arc<Message>>,
        ttl: Duration,
        lagged: Arc<Counter>,
    ) -> Self {
        Self {
            group,
            rx,
            ttl,
            dropped: 0,
            lagged,
        }
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// Messages skipped because this subscriber fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Wait for the next message
    ///
    /// Messages that expired while buffered are skipped. Returns
    /// `SubscriptionClosed` once the group is gone and the buffer is drained.
    pub async fn recv(&mut self) -> Result<Arc<Message>> {
        loop {
            match self.rx.recv().await {
                Ok(message) if message.is_expired(self.ttl) => continue,
                Ok(message) => return Ok(message),
                Err(RecvError::Lagged(skipped)) => self.on_lag(skipped),
                Err(RecvError::Closed) => return Err(Error::SubscriptionClosed),
            }
        }
    }

    /// Next buffered message without waiting
    pub fn try_recv(&mut self) -> Result<Option<Arc<Message>>> {
        loop {
            match self.rx.try_recv() {
                Ok(message) if message.is_expired(self.ttl) => continue,
                Ok(message) => return Ok(Some(message)),
                Err(TryRecvError::Lagged(skipped)) => self.on_lag(skipped),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(Error::SubscriptionClosed),
            }
        }
    }

    fn on_lag(&mut self, skipped: u64) {
        self.dropped += skipped;
        self.lagged.add(skipped);
        tracing::warn!(
            group = %self.group,
            skipped = skipped,
            total_dropped = self.dropped,
            "Subscriber lagging, oldest messages dropped"
        );
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("group", &self.group)
            .field("dropped", &self.dropped)
            .finish()
    }
}
