//! Session registry implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;

use crate::bus::{Message, MessageBus, Subscription};
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::geo::{BucketKey, Coordinate, GeoIndex, Radius};
use crate::group::{GroupAllocator, GroupId};
use crate::stats::Counter;

use super::state::{SessionId, SessionInfo, SessionState};
use super::subscription::{Handoff, SessionSubscription};

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinInfo {
    pub session_id: SessionId,
    pub group_id: GroupId,
    pub bucket_key: BucketKey,
}

/// Where a session sits after a location or radius update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub group_id: GroupId,
    pub bucket_key: BucketKey,
    /// Whether the update moved the session to another group
    pub moved: bool,
}

struct SessionEntry {
    state: SessionState,
    /// Open session subscriptions, handed a new group subscription on every
    /// move; dropped when the session leaves
    followers: Vec<mpsc::UnboundedSender<Handoff>>,
}

impl SessionEntry {
    fn check_live(&self) -> Result<()> {
        if self.state.is_left() {
            return Err(Error::UnknownSession(self.state.id));
        }
        Ok(())
    }

    fn group(&self) -> Result<GroupId> {
        self.state
            .group
            .clone()
            .ok_or(Error::UnknownSession(self.state.id))
    }
}

/// Registry of all active sessions
///
/// Each session has its own lock, so operations on one session are applied
/// one at a time while different sessions proceed in parallel. The map lock
/// is never held while waiting for a session lock.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SessionEntry>>>>,
    geo: GeoIndex,
    allocator: Arc<GroupAllocator>,
    bus: Arc<MessageBus>,
    next_session_id: AtomicU64,
    config: ChatConfig,
    timed_out: Counter,
}

impl SessionRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(ChatConfig::default())
    }

    /// Create a registry with its own bus and allocator
    pub fn with_config(config: ChatConfig) -> Self {
        let bus = Arc::new(MessageBus::with_config(config.clone()));
        let allocator = Arc::new(GroupAllocator::new(&config, Arc::clone(&bus)));
        Self::with_parts(config, allocator, bus)
    }

    /// Create a registry on top of an existing allocator and bus
    pub fn with_parts(
        config: ChatConfig,
        allocator: Arc<GroupAllocator>,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            geo: GeoIndex::new(),
            allocator,
            bus,
            next_session_id: AtomicU64::new(1),
            config,
            timed_out: Counter::new(),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn allocator(&self) -> &Arc<GroupAllocator> {
        &self.allocator
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn geo(&self) -> &GeoIndex {
        &self.geo
    }

    async fn entry(&self, id: SessionId) -> Result<Arc<Mutex<SessionEntry>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownSession(id))
    }

    /// Register a new session and place it in a group
    pub async fn join(
        &self,
        coordinate: Coordinate,
        radius: Radius,
        display_name: &str,
    ) -> Result<JoinInfo> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::EmptyDisplayName);
        }
        let bucket = self.geo.bucket_for_radius(&coordinate, radius)?;

        let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let mut state = SessionState::new(id, display_name, coordinate, radius, bucket.clone());

        let group = self.allocator.assign(&bucket, id).await;
        state.activate(group.clone());

        let entry = SessionEntry {
            state,
            followers: Vec::new(),
        };
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(entry)));

        tracing::info!(
            session_id = %id,
            name = display_name,
            bucket = %bucket,
            group = %group,
            radius = %radius,
            "Session joined"
        );

        Ok(JoinInfo {
            session_id: id,
            group_id: group,
            bucket_key: bucket,
        })
    }

    /// Report a new location
    pub async fn update_location(&self, id: SessionId, coordinate: Coordinate) -> Result<Placement> {
        self.relocate(id, Some(coordinate), None).await
    }

    /// Choose a new radius
    pub async fn update_radius(&self, id: SessionId, radius: Radius) -> Result<Placement> {
        self.relocate(id, None, Some(radius)).await
    }

    async fn relocate(
        &self,
        id: SessionId,
        coordinate: Option<Coordinate>,
        radius: Option<Radius>,
    ) -> Result<Placement> {
        let entry = self.entry(id).await?;
        let mut entry = entry.lock().await;
        entry.check_live()?;

        let coordinate = coordinate.unwrap_or(entry.state.coordinate);
        let radius = radius.unwrap_or(entry.state.radius);
        let bucket = self.geo.bucket_for_radius(&coordinate, radius)?;
        let old_group = entry.group()?;

        entry.state.touch();

        if bucket == entry.state.bucket {
            entry.state.coordinate = coordinate;
            entry.state.radius = radius;
            return Ok(Placement {
                group_id: old_group,
                bucket_key: bucket,
                moved: false,
            });
        }

        entry.state.begin_reassign();
        entry.followers.retain(|tx| !tx.is_closed());

        let (new_group, feeds) = self
            .allocator
            .assign_subscribed(&bucket, id, entry.followers.len())
            .await;
        if let Err(e) = self.allocator.release(&old_group, id).await {
            tracing::warn!(session_id = %id, group = %old_group, error = %e, "Old group already gone");
        }
        // Old-group messages up to this instant still reach the feeds
        self.hand_off(&entry, feeds, Instant::now());

        entry
            .state
            .complete_reassign(coordinate, radius, bucket.clone(), new_group.clone());

        tracing::info!(
            session_id = %id,
            from = %old_group,
            to = %new_group,
            radius = %radius,
            "Session reassigned"
        );

        Ok(Placement {
            group_id: new_group,
            bucket_key: bucket,
            moved: true,
        })
    }

    fn hand_off(&self, entry: &SessionEntry, feeds: Vec<Subscription>, cutover: Instant) {
        if feeds.len() < entry.followers.len() {
            tracing::warn!(
                session_id = %entry.state.id,
                followers = entry.followers.len(),
                feeds = feeds.len(),
                "Some subscriptions could not follow the session"
            );
        }

        for (tx, subscription) in entry.followers.iter().zip(feeds) {
            // Receiver gone means the subscription was just dropped
            let _ = tx.send(Handoff {
                subscription,
                cutover,
            });
        }
    }

    /// Remove a session and release its group membership
    pub async fn leave(&self, id: SessionId) -> Result<()> {
        let entry = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(Error::UnknownSession(id))?;

        let mut entry = entry.lock().await;
        self.retire(&mut entry).await;

        tracing::info!(session_id = %id, "Session left");
        Ok(())
    }

    async fn retire(&self, entry: &mut SessionEntry) {
        let id = entry.state.id;
        let group = entry.state.mark_left();
        entry.followers.clear();

        if let Some(group) = group {
            if let Err(e) = self.allocator.release(&group, id).await {
                tracing::warn!(session_id = %id, group = %group, error = %e, "Group already gone on leave");
            }
        }
    }

    /// Refresh a session's heartbeat
    pub async fn heartbeat(&self, id: SessionId) -> Result<()> {
        let entry = self.entry(id).await?;
        let mut entry = entry.lock().await;
        entry.check_live()?;
        entry.state.touch();
        Ok(())
    }

    /// Send a message to the session's current group
    pub async fn send(&self, id: SessionId, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyMessage);
        }
        let len = text.chars().count();
        if len > self.config.max_message_len {
            return Err(Error::MessageTooLong {
                len,
                max: self.config.max_message_len,
            });
        }

        let entry = self.entry(id).await?;
        let mut entry = entry.lock().await;
        entry.check_live()?;
        entry.state.touch();

        let group = entry.group()?;
        let message = Message::new(group, id, Arc::clone(&entry.state.display_name), text);
        // Published under the session lock: a concurrent relocation of this
        // session cannot slip in between reading the group and publishing.
        self.bus.publish(message).await?;

        Ok(())
    }

    /// Follow the session's group messages
    ///
    /// The subscription moves with the session when it is reassigned and
    /// ends when the session leaves.
    pub async fn subscribe(&self, id: SessionId) -> Result<SessionSubscription> {
        let entry = self.entry(id).await?;
        let mut entry = entry.lock().await;
        entry.check_live()?;
        entry.state.touch();

        let group = entry.group()?;
        let inner = self.bus.subscribe(&group).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        entry.followers.retain(|tx| !tx.is_closed());
        entry.followers.push(tx);

        tracing::debug!(
            session_id = %id,
            group = %group,
            followers = entry.followers.len(),
            "Session subscribed"
        );
        Ok(SessionSubscription::new(id, rx, inner))
    }

    /// Unexpired messages of the session's current group, oldest first
    pub async fn recent(&self, id: SessionId) -> Result<Vec<Arc<Message>>> {
        let entry = self.entry(id).await?;
        let mut entry = entry.lock().await;
        entry.check_live()?;
        entry.state.touch();
        self.bus.recent(&entry.group()?).await
    }

    /// Snapshot of a session
    ///
    /// Does not count as activity.
    pub async fn session(&self, id: SessionId) -> Result<SessionInfo> {
        let entry = self.entry(id).await?;
        let entry = entry.lock().await;
        entry.check_live()?;
        Ok(entry.state.info())
    }

    /// Number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Other sessions in the session's bucket or the adjacent ones
    ///
    /// Distance is judged at this session's precision, whatever radius the
    /// other sessions picked.
    pub async fn nearby_count(&self, id: SessionId) -> Result<usize> {
        let bucket = {
            let entry = self.entry(id).await?;
            let mut entry = entry.lock().await;
            entry.check_live()?;
            entry.state.touch();
            entry.state.bucket.clone()
        };
        let area = self.geo.neighbors(&bucket)?;

        let others: Vec<Arc<Mutex<SessionEntry>>> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(sid, _)| **sid != id)
            .map(|(_, entry)| Arc::clone(entry))
            .collect();

        let mut count = 0;
        for other in others {
            let other = other.lock().await;
            if other.state.is_left() {
                continue;
            }
            let cell = self.geo.bucket_for(&other.state.coordinate, bucket.precision())?;
            if area.contains(&cell) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Sessions removed for missing heartbeats
    pub fn timed_out_count(&self) -> u64 {
        self.timed_out.get()
    }

    /// Run one idle sweep
    ///
    /// Sessions not seen for `heartbeat_timeout` are removed as if they had
    /// left. Returns the number removed.
    pub async fn sweep_idle(&self) -> usize {
        let timeout = self.config.heartbeat_timeout;
        let now = Instant::now();

        let candidates: Vec<(SessionId, Arc<Mutex<SessionEntry>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .filter_map(|(id, entry_arc)| {
                // Try to get the lock without blocking; a busy session is not idle
                let entry = entry_arc.try_lock().ok()?;
                if entry.state.is_idle(timeout, now) {
                    Some((*id, Arc::clone(entry_arc)))
                } else {
                    None
                }
            })
            .collect();

        let mut removed = 0;
        for (id, entry_arc) in candidates {
            let mut entry = entry_arc.lock().await;
            // Re-check: a heartbeat may have landed since the scan
            if entry.state.is_left() || !entry.state.is_idle(timeout, Instant::now()) {
                continue;
            }

            if self.sessions.write().await.remove(&id).is_none() {
                continue;
            }
            self.retire(&mut entry).await;
            self.timed_out.incr();
            removed += 1;

            tracing::info!(
                session_id = %id,
                idle_secs = entry.state.last_seen.elapsed().as_secs(),
                "Session timed out"
            );
        }

        removed
    }

    /// Spawn background idle-session sweep
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.session_sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.sweep_idle().await;
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn paris() -> Coordinate {
        Coordinate::new(48.8566, 2.3522).unwrap()
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let registry = SessionRegistry::new();

        let info = registry
            .join(paris(), Radius::Meters5000, "  alice ")
            .await
            .unwrap();
        assert_eq!(info.bucket_key.as_str(), "u09t");
        assert_eq!(info.group_id.bucket(), &info.bucket_key);

        let session = registry.session(info.session_id).await.unwrap();
        assert_eq!(session.display_name, "alice");
        assert_eq!(session.group, Some(info.group_id.clone()));
        assert_eq!(registry.session_count().await, 1);

        assert_ok!(registry.leave(info.session_id).await);
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.allocator().group_size(&info.group_id).await, None);

        let again = registry.leave(info.session_id).await;
        assert_eq!(again, Err(Error::UnknownSession(info.session_id)));
    }

    #[tokio::test]
    async fn test_resubscribing_prunes_dropped_feeds() {
        let registry = SessionRegistry::new();
        let info = registry.join(paris(), Radius::Meters5000, "a").await.unwrap();

        for _ in 0..5 {
            let feed = registry.subscribe(info.session_id).await.unwrap();
            drop(feed);
        }
        let _kept = registry.subscribe(info.session_id).await.unwrap();

        let entry = registry.entry(info.session_id).await.unwrap();
        assert_eq!(entry.lock().await.followers.len(), 1);
    }

    #[tokio::test]
    async fn test_join_rejects_blank_name() {
        let registry = SessionRegistry::new();

        let result = registry.join(paris(), Radius::default(), "   ").await;
        assert_eq!(result, Err(Error::EmptyDisplayName));
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.allocator().group_count().await, 0);
    }

    #[tokio::test]
    async fn test_same_bucket_update_keeps_group() {
        let registry = SessionRegistry::new();
        let info = registry.join(paris(), Radius::Meters5000, "a").await.unwrap();

        // Still inside u09t
        let nearby = Coordinate::new(48.80, 2.25).unwrap();
        let placement = registry
            .update_location(info.session_id, nearby)
            .await
            .unwrap();

        assert!(!placement.moved);
        assert_eq!(placement.group_id, info.group_id);
        let session = registry.session(info.session_id).await.unwrap();
        assert_eq!(session.coordinate, nearby);
    }

    #[tokio::test]
    async fn test_update_radius_changes_bucket() {
        let registry = SessionRegistry::new();
        let a = registry.join(paris(), Radius::Meters5000, "a").await.unwrap();
        let b = registry.join(paris(), Radius::Meters5000, "b").await.unwrap();
        assert_eq!(a.group_id, b.group_id);

        let placement = registry
            .update_radius(a.session_id, Radius::Meters100)
            .await
            .unwrap();

        assert!(placement.moved);
        assert_eq!(placement.bucket_key.as_str(), "u09tvw0");
        assert_eq!(registry.allocator().group_size(&a.group_id).await, Some(1));
        assert_eq!(
            registry.allocator().members(&placement.group_id).await,
            Some(vec![a.session_id])
        );

        let session = registry.session(a.session_id).await.unwrap();
        assert_eq!(session.radius, Radius::Meters100);
        assert_eq!(session.group, Some(placement.group_id));
    }

    #[tokio::test]
    async fn test_stale_session_errors() {
        let registry = SessionRegistry::new();
        let ghost = SessionId::new(999);

        assert_err!(registry.send(ghost, "hi").await);
        assert_err!(registry.heartbeat(ghost).await);
        assert!(matches!(
            registry.update_radius(ghost, Radius::Meters500).await,
            Err(Error::UnknownSession(_))
        ));
        assert!(matches!(
            registry.subscribe(ghost).await,
            Err(Error::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_send_validates_text() {
        let config = ChatConfig::default().max_message_len(5);
        let registry = SessionRegistry::with_config(config);
        let info = registry.join(paris(), Radius::default(), "a").await.unwrap();

        assert_eq!(
            registry.send(info.session_id, " \n ").await,
            Err(Error::EmptyMessage)
        );
        assert_eq!(
            registry.send(info.session_id, "toolong").await,
            Err(Error::MessageTooLong { len: 7, max: 5 })
        );
        // Trimmed before measuring
        assert_ok!(registry.send(info.session_id, "  hey  ").await);

        let recent = registry.recent(info.session_id).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].text(), "hey");
        assert_eq!(recent[0].author_name(), "a");
    }

    #[tokio::test]
    async fn test_nearby_count() {
        let registry = SessionRegistry::new();
        let me = registry.join(paris(), Radius::Meters5000, "me").await.unwrap();

        // same cell
        registry
            .join(Coordinate::new(48.80, 2.25).unwrap(), Radius::Meters5000, "a")
            .await
            .unwrap();
        // neighbor cell u09w, different radius does not matter
        registry
            .join(Coordinate::new(48.95, 2.2).unwrap(), Radius::Meters100, "b")
            .await
            .unwrap();
        // far away
        registry
            .join(Coordinate::new(51.5074, -0.1278).unwrap(), Radius::Meters5000, "c")
            .await
            .unwrap();

        assert_eq!(registry.nearby_count(me.session_id).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_idle_removes_silent_sessions() {
        let config = ChatConfig::default().heartbeat_timeout(Duration::from_secs(60));
        let registry = SessionRegistry::with_config(config);

        let quiet = registry.join(paris(), Radius::default(), "quiet").await.unwrap();
        let chatty = registry.join(paris(), Radius::default(), "chatty").await.unwrap();

        tokio::time::advance(Duration::from_secs(40)).await;
        registry.heartbeat(chatty.session_id).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(registry.sweep_idle().await, 1);
        assert!(matches!(
            registry.session(quiet.session_id).await,
            Err(Error::UnknownSession(_))
        ));
        assert!(registry.session(chatty.session_id).await.is_ok());
        assert_eq!(registry.timed_out_count(), 1);
        assert_eq!(
            registry.allocator().members(&chatty.group_id).await,
            Some(vec![chatty.session_id])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_times_out_sessions() {
        let config = ChatConfig::default()
            .heartbeat_timeout(Duration::from_secs(60))
            .session_sweep_interval(Duration::from_secs(10));
        let registry = Arc::new(SessionRegistry::with_config(config));

        registry.join(paris(), Radius::default(), "a").await.unwrap();
        let handle = registry.spawn_sweep_task();

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.allocator().group_count().await, 0);

        handle.abort();
    }
}
