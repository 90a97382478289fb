//! Message bus implementation
//!
//! Owns one channel per live group, routes published messages to the
//! group's subscribers and purges expired messages in the background.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::group::GroupId;
use crate::stats::Counter;

use super::channel::{ChannelStats, GroupChannel};
use super::message::Message;
use super::subscription::Subscription;

/// Central bus for all group channels
///
/// The map lock is only held long enough to find a channel; publishing,
/// subscribing and expiry then serialize on the channel's own lock.
pub struct MessageBus {
    /// Map of group id to channel
    groups: RwLock<HashMap<GroupId, Arc<Mutex<GroupChannel>>>>,

    /// Configuration
    config: ChatConfig,

    published: Counter,
    expired: Counter,
    lagged: Arc<Counter>,
}

impl MessageBus {
    /// Create a bus with default configuration
    pub fn new() -> Self {
        Self::with_config(ChatConfig::default())
    }

    /// Create a bus with custom configuration
    pub fn with_config(config: ChatConfig) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            config,
            published: Counter::new(),
            expired: Counter::new(),
            lagged: Arc::new(Counter::new()),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Open a channel for a group
    ///
    /// Returns false if it was already open.
    pub async fn open(&self, group_id: &GroupId) -> bool {
        let mut groups = self.groups.write().await;
        if groups.contains_key(group_id) {
            return false;
        }
        groups.insert(
            group_id.clone(),
            Arc::new(Mutex::new(GroupChannel::new(&self.config))),
        );
        tracing::debug!(group = %group_id, "Channel opened");
        true
    }

    /// Close a group's channel
    ///
    /// Its log is discarded; subscribers receive `SubscriptionClosed` after
    /// draining what they already buffered. Returns false if it was not open.
    pub async fn close(&self, group_id: &GroupId) -> bool {
        let removed = self.groups.write().await.remove(group_id);
        if removed.is_some() {
            tracing::debug!(group = %group_id, "Channel closed");
        }
        removed.is_some()
    }

    async fn channel(&self, group_id: &GroupId) -> Result<Arc<Mutex<GroupChannel>>> {
        self.groups
            .read()
            .await
            .get(group_id)
            .cloned()
            .ok_or_else(|| Error::UnknownGroup(group_id.clone()))
    }

    /// Publish a message to the group it belongs to
    ///
    /// Returns the number of subscribers it was delivered to.
    pub async fn publish(&self, message: Message) -> Result<usize> {
        let channel = self.channel(message.group()).await?;
        let mut channel = channel.lock().await;

        let group = message.group().clone();
        let receivers = channel.append(Arc::new(message));
        self.published.incr();

        tracing::debug!(group = %group, receivers = receivers, "Message published");
        Ok(receivers)
    }

    /// Subscribe to messages published to a group from now on
    pub async fn subscribe(&self, group_id: &GroupId) -> Result<Subscription> {
        let channel = self.channel(group_id).await?;
        let channel = channel.lock().await;

        let rx = channel.subscribe();
        tracing::debug!(
            group = %group_id,
            subscribers = channel.stats().subscriber_count,
            "Subscriber added"
        );

        Ok(Subscription::new(
            group_id.clone(),
            rx,
            self.config.message_ttl,
            Arc::clone(&self.lagged),
        ))
    }

    /// Unexpired messages of a group, oldest first
    pub async fn recent(&self, group_id: &GroupId) -> Result<Vec<Arc<Message>>> {
        let channel = self.channel(group_id).await?;
        let channel = channel.lock().await;
        Ok(channel.recent(self.config.message_ttl, Instant::now()))
    }

    /// Get channel statistics
    pub async fn channel_stats(&self, group_id: &GroupId) -> Option<ChannelStats> {
        let channel = self.channel(group_id).await.ok()?;
        let channel = channel.lock().await;
        Some(channel.stats())
    }

    /// Number of open channels
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Messages published since the bus was created
    pub fn published_count(&self) -> u64 {
        self.published.get()
    }

    /// Messages removed by expiry
    pub fn expired_count(&self) -> u64 {
        self.expired.get()
    }

    /// Messages skipped by lagging subscribers
    pub fn dropped_count(&self) -> u64 {
        self.lagged.get()
    }

    /// Run one expiry pass over every channel
    ///
    /// Returns the number of messages removed.
    pub async fn expire(&self) -> usize {
        let channels: Vec<(GroupId, Arc<Mutex<GroupChannel>>)> = self
            .groups
            .read()
            .await
            .iter()
            .map(|(id, channel)| (id.clone(), Arc::clone(channel)))
            .collect();

        let now = Instant::now();
        let mut removed = 0;

        for (group_id, channel) in channels {
            let count = channel.lock().await.expire(self.config.message_ttl, now);
            if count > 0 {
                tracing::debug!(group = %group_id, expired = count, "Messages expired");
            }
            removed += count;
        }

        if removed > 0 {
            self.expired.add(removed as u64);
            tracing::info!(expired = removed, "Expiry sweep finished");
        }
        removed
    }

    /// Spawn background expiry task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let bus = Arc::clone(self);
        let interval = bus.config.expiry_sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                bus.expire().await;
            }
        })
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
