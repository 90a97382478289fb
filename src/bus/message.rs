//! Chat message type

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

use crate::group::GroupId;
use crate::session::SessionId;

/// An immutable chat message
///
/// Created once by the sender and shared by reference count between the
/// group log and every subscriber.
#[derive(Debug, Clone)]
pub struct Message {
    group: GroupId,
    author: SessionId,
    author_name: Arc<str>,
    text: String,
    /// Wall-clock send time, milliseconds since the UNIX epoch
    timestamp_ms: u64,
    /// Monotonic send time, used for expiry
    created_at: Instant,
}

impl Message {
    pub fn new(
        group: GroupId,
        author: SessionId,
        author_name: Arc<str>,
        text: impl Into<String>,
    ) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            group,
            author,
            author_name,
            text: text.into(),
            timestamp_ms,
            created_at: Instant::now(),
        }
    }

    /// Group the message was sent to
    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn author(&self) -> SessionId {
        self.author
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether the message is at least `ttl` old at `now`
    pub fn is_expired_at(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= ttl
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(ttl, Instant::now())
    }
}
