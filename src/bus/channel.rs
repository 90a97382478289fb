//! Per-group channel state

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::ChatConfig;

use super::message::Message;

/// Log and fan-out sender for one group
pub(super) struct GroupChannel {
    /// Recent messages, oldest first
    log: VecDeque<Arc<Message>>,

    /// Broadcast sender for fan-out to subscribers
    tx: broadcast::Sender<Arc<Message>>,

    /// Log length cap
    max_log_len: usize,

    /// When the channel was opened
    created_at: Instant,
}

impl GroupChannel {
    pub(super) fn new(config: &ChatConfig) -> Self {
        let (tx, _) = broadcast::channel(config.subscriber_buffer);

        Self {
            log: VecDeque::new(),
            tx,
            max_log_len: config.max_log_len,
            created_at: Instant::now(),
        }
    }

    /// Append to the log and send to all subscribers
    ///
    /// Returns the number of subscribers that will see the message.
    pub(super) fn append(&mut self, message: Arc<Message>) -> usize {
        if self.log.len() >= self.max_log_len {
            self.log.pop_front();
        }
        self.log.push_back(Arc::clone(&message));

        // Err only means there are no subscribers right now
        self.tx.send(message).unwrap_or(0)
    }

    pub(super) fn subscribe(&self) -> broadcast::Receiver<Arc<Message>> {
        self.tx.subscribe()
    }

    /// Drop messages at least `ttl` old; returns how many were removed
    pub(super) fn expire(&mut self, ttl: Duration, now: Instant) -> usize {
        let before = self.log.len();
        // The log is in send order, so expired messages form a prefix
        while self
            .log
            .front()
            .is_some_and(|m| m.is_expired_at(ttl, now))
        {
            self.log.pop_front();
        }
        before - self.log.len()
    }

    /// Unexpired messages, oldest first
    pub(super) fn recent(&self, ttl: Duration, now: Instant) -> Vec<Arc<Message>> {
        self.log
            .iter()
            .filter(|m| !m.is_expired_at(ttl, now))
            .cloned()
            .collect()
    }

    pub(super) fn stats(&self) -> ChannelStats {
        ChannelStats {
            log_len: self.log.len(),
            subscriber_count: self.tx.receiver_count(),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a group channel
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// Messages currently held in the log
    pub log_len: usize,
    /// Live subscriptions
    pub subscriber_count: usize,
    /// Time since the channel was opened
    pub age: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BucketKey;
    use crate::group::GroupId;
    use crate::session::SessionId;

    fn msg(text: &str) -> Arc<Message> {
        let group = GroupId::new(BucketKey::from_raw("u09t"), 1);
        Arc::new(Message::new(group, SessionId::new(1), Arc::from("a"), text))
    }

    #[test]
    fn test_log_is_capped() {
        let config = ChatConfig::default().max_log_len(2);
        let mut channel = GroupChannel::new(&config);

        channel.append(msg("one"));
        channel.append(msg("two"));
        channel.append(msg("three"));

        let texts: Vec<String> = channel
            .recent(config.message_ttl, Instant::now())
            .iter()
            .map(|m| m.text().to_string())
            .collect();
        assert_eq!(texts, vec!["two", "three"]);
    }

    #[test]
    fn test_append_without_subscribers() {
        let mut channel = GroupChannel::new(&ChatConfig::default());
        assert_eq!(channel.append(msg("nobody listening")), 0);
        assert_eq!(channel.stats().log_len, 1);

        let _rx = channel.subscribe();
        assert_eq!(channel.append(msg("someone")), 1);
        assert_eq!(channel.stats().subscriber_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_prefix() {
        let ttl = Duration::from_secs(60);
        let mut channel = GroupChannel::new(&ChatConfig::default());

        channel.append(msg("old"));
        tokio::time::advance(Duration::from_secs(30)).await;
        channel.append(msg("new"));
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(channel.expire(ttl, Instant::now()), 1);
        let left = channel.recent(ttl, Instant::now());
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].text(), "new");
    }
}
