//! Service configuration

use std::time::Duration;

/// Maximum members per group
pub const DEFAULT_GROUP_CAPACITY: usize = 150;

/// Messages disappear this long after they were sent
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_secs(10 * 60);

/// How often expired messages are purged
pub const DEFAULT_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Chat service configuration options
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Maximum members per group
    pub group_capacity: usize,

    /// Message time-to-live
    pub message_ttl: Duration,

    /// Interval between expiry sweeps of the message logs
    pub expiry_sweep_interval: Duration,

    /// Messages buffered per subscriber before the oldest are dropped
    pub subscriber_buffer: usize,

    /// Maximum messages kept in a group's log
    pub max_log_len: usize,

    /// Maximum message length in characters
    pub max_message_len: usize,

    /// Sessions not seen for this long are removed
    pub heartbeat_timeout: Duration,

    /// Interval between idle-session sweeps
    pub session_sweep_interval: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            group_capacity: DEFAULT_GROUP_CAPACITY,
            message_ttl: DEFAULT_MESSAGE_TTL,
            expiry_sweep_interval: DEFAULT_EXPIRY_SWEEP_INTERVAL,
            subscriber_buffer: 256,
            max_log_len: 1024,
            max_message_len: 500,
            heartbeat_timeout: Duration::from_secs(120),
            session_sweep_interval: Duration::from_secs(30),
        }
    }
}

impl ChatConfig {
    /// Defaults overridden by `EPHEMERAL_*` environment variables
    ///
    /// Variables that are missing or fail to parse leave the default in place.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ChatConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let num = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(var = key, value = %raw, error = %e, "Ignoring invalid config value");
                    None
                }
            }
        };

        let mut config = Self::default();
        if let Some(v) = num("EPHEMERAL_GROUP_CAPACITY") {
            config = config.group_capacity(v as usize);
        }
        if let Some(v) = num("EPHEMERAL_MESSAGE_TTL_SECS") {
            config = config.message_ttl(Duration::from_secs(v));
        }
        if let Some(v) = num("EPHEMERAL_EXPIRY_SWEEP_SECS") {
            config = config.expiry_sweep_interval(Duration::from_secs(v));
        }
        if let Some(v) = num("EPHEMERAL_SUBSCRIBER_BUFFER") {
            config = config.subscriber_buffer(v as usize);
        }
        if let Some(v) = num("EPHEMERAL_HEARTBEAT_TIMEOUT_SECS") {
            config = config.heartbeat_timeout(Duration::from_secs(v));
        }
        if let Some(v) = num("EPHEMERAL_SESSION_SWEEP_SECS") {
            config = config.session_sweep_interval(Duration::from_secs(v));
        }
        if let Some(v) = num("EPHEMERAL_MAX_MESSAGE_LEN") {
            config = config.max_message_len(v as usize);
        }
        config
    }

    /// Set group capacity (at least 1)
    pub fn group_capacity(mut self, capacity: usize) -> Self {
        self.group_capacity = capacity.max(1);
        self
    }

    /// Set message time-to-live
    pub fn message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = ttl;
        self
    }

    /// Set expiry sweep interval (zero is bumped to 1ms)
    pub fn expiry_sweep_interval(mut self, interval: Duration) -> Self {
        self.expiry_sweep_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set per-subscriber buffer (at least 1)
    pub fn subscriber_buffer(mut self, size: usize) -> Self {
        self.subscriber_buffer = size.max(1);
        self
    }

    /// Set maximum log length per group (at least 1)
    pub fn max_log_len(mut self, len: usize) -> Self {
        self.max_log_len = len.max(1);
        self
    }

    /// Set maximum message length in characters
    pub fn max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    /// Set heartbeat timeout
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Set idle-session sweep interval (zero is bumped to 1ms)
    pub fn session_sweep_interval(mut self, interval: Duration) -> Self {
        self.session_sweep_interval = interval.max(Duration::from_millis(1));
        self
    }
}
