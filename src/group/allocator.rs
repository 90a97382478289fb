//! Group allocation
//!
//! Places sessions into groups per bucket and keeps the message bus in step
//! with group creation and destruction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::bus::{MessageBus, Subscription};
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::geo::BucketKey;
use crate::session::SessionId;

use super::entry::{Group, GroupFull, GroupInfo};
use super::id::GroupId;

/// Assigns sessions to capacity-bounded groups
///
/// The whole membership table sits behind one lock, so an assignment or
/// release is never observed half-done.
pub struct GroupAllocator {
    /// Groups per bucket, in creation order
    buckets: RwLock<HashMap<BucketKey, Vec<Group>>>,

    /// Next group sequence number
    next_seq: AtomicU64,

    /// Maximum members per group
    capacity: usize,

    /// Channels are opened/closed alongside groups
    bus: Arc<MessageBus>,
}

impl GroupAllocator {
    pub fn new(config: &ChatConfig, bus: Arc<MessageBus>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            capacity: config.group_capacity,
            bus,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Place a session in a group of `bucket`
    ///
    /// Picks the most recently created group that still has room and creates
    /// a new one when there is none. A session already placed in this bucket
    /// keeps its group.
    pub async fn assign(&self, bucket: &BucketKey, session_id: SessionId) -> GroupId {
        self.assign_subscribed(bucket, session_id, 0).await.0
    }

    /// Like [`GroupAllocator::assign`], also opening `feeds` subscriptions
    ///
    /// The subscriptions are taken before the session is admitted, so they
    /// see every message published to the group while it is a member.
    pub async fn assign_subscribed(
        &self,
        bucket: &BucketKey,
        session_id: SessionId,
        feeds: usize,
    ) -> (GroupId, Vec<Subscription>) {
        let mut buckets = self.buckets.write().await;
        let groups = buckets.entry(bucket.clone()).or_default();

        if let Some(existing) = groups.iter().find(|g| g.contains(session_id)) {
            let id = existing.id().clone();
            let subscriptions = self.subscribe_all(&id, feeds).await;
            return (id, subscriptions);
        }

        if let Some(pos) = groups.iter().rposition(|g| !g.is_full()) {
            let id = groups[pos].id().clone();
            let subscriptions = self.subscribe_all(&id, feeds).await;
            match groups[pos].admit(session_id) {
                Ok(()) => {
                    tracing::debug!(
                        group = %id,
                        session_id = %session_id,
                        size = groups[pos].len(),
                        "Session assigned to existing group"
                    );
                    return (id, subscriptions);
                }
                Err(GroupFull) => {
                    tracing::warn!(group = %id, session_id = %session_id, "Group filled up during assignment");
                }
            }
        }

        let id = GroupId::new(bucket.clone(), self.next_seq.fetch_add(1, Ordering::Relaxed));
        self.bus.open(&id).await;
        let subscriptions = self.subscribe_all(&id, feeds).await;
        groups.push(Group::founded_by(id.clone(), self.capacity, session_id));

        tracing::info!(
            group = %id,
            session_id = %session_id,
            bucket_groups = groups.len(),
            "Group created"
        );

        (id, subscriptions)
    }

    async fn subscribe_all(&self, group_id: &GroupId, feeds: usize) -> Vec<Subscription> {
        let mut subscriptions = Vec::with_capacity(feeds);
        for _ in 0..feeds {
            match self.bus.subscribe(group_id).await {
                Ok(subscription) => subscriptions.push(subscription),
                Err(e) => {
                    tracing::warn!(group = %group_id, error = %e, "Subscribe on assignment failed");
                }
            }
        }
        subscriptions
    }

    /// Remove a session from a group
    ///
    /// Returns the number of members left. A group left empty is destroyed and
    /// its bus channel closed.
    pub async fn release(&self, group_id: &GroupId, session_id: SessionId) -> Result<usize> {
        let mut buckets = self.buckets.write().await;

        let groups = buckets
            .get_mut(group_id.bucket())
            .ok_or_else(|| Error::UnknownGroup(group_id.clone()))?;
        let pos = groups
            .iter()
            .position(|g| g.id() == group_id)
            .ok_or_else(|| Error::UnknownGroup(group_id.clone()))?;

        let group = &mut groups[pos];
        if !group.remove(session_id) {
            tracing::warn!(
                group = %group_id,
                session_id = %session_id,
                "Release for a session that is not a member"
            );
            return Ok(group.len());
        }

        let remaining = group.len();
        if remaining == 0 {
            groups.remove(pos);
            let bucket_empty = groups.is_empty();
            if bucket_empty {
                buckets.remove(group_id.bucket());
            }
            self.bus.close(group_id).await;

            tracing::info!(group = %group_id, "Group destroyed (empty)");
        } else {
            tracing::debug!(
                group = %group_id,
                session_id = %session_id,
                size = remaining,
                "Session released from group"
            );
        }

        Ok(remaining)
    }

    /// Current size of a group, `None` if it does not exist
    pub async fn group_size(&self, group_id: &GroupId) -> Option<usize> {
        let buckets = self.buckets.read().await;
        find(&buckets, group_id).map(|g| g.len())
    }

    /// Members of a group in join order
    pub async fn members(&self, group_id: &GroupId) -> Option<Vec<SessionId>> {
        let buckets = self.buckets.read().await;
        find(&buckets, group_id).map(|g| g.members().to_vec())
    }

    /// All groups of a bucket, oldest first
    pub async fn groups_in(&self, bucket: &BucketKey) -> Vec<GroupInfo> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .map(|groups| groups.iter().map(Group::info).collect())
            .unwrap_or_default()
    }

    /// Total number of live groups
    pub async fn group_count(&self) -> usize {
        self.buckets.read().await.values().map(Vec::len).sum()
    }

    /// Number of buckets with at least one group
    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }
}

fn find<'a>(buckets: &'a HashMap<BucketKey, Vec<Group>>, group_id: &GroupId) -> Option<&'a Group> {
    buckets
        .get(group_id.bucket())?
        .iter()
        .find(|g| g.id() == group_id)
}
