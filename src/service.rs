//! Chat service
//!
//! Wires the registry, allocator and bus from one configuration and runs
//! the background sweeps.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::bus::MessageBus;
use crate::config::ChatConfig;
use crate::group::GroupAllocator;
use crate::session::SessionRegistry;
use crate::stats::ServiceStats;

/// Proximity chat service
///
/// The presentation layer talks to [`ChatService::registry`]; the service
/// itself only owns the lifecycle of the background tasks.
pub struct ChatService {
    config: ChatConfig,
    registry: Arc<SessionRegistry>,
}

impl ChatService {
    /// Create a service with the given configuration
    pub fn new(config: ChatConfig) -> Self {
        let registry = Arc::new(SessionRegistry::with_config(config.clone()));
        Self { config, registry }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Session operations (join, send, subscribe, update, leave)
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        self.registry.bus()
    }

    pub fn allocator(&self) -> &Arc<GroupAllocator> {
        self.registry.allocator()
    }

    /// Spawn the expiry and idle-session sweeps
    ///
    /// The tasks stop when the returned handle is dropped.
    pub fn start(&self) -> BackgroundTasks {
        tracing::info!(
            message_ttl_secs = self.config.message_ttl.as_secs(),
            expiry_sweep_secs = self.config.expiry_sweep_interval.as_secs(),
            heartbeat_timeout_secs = self.config.heartbeat_timeout.as_secs(),
            group_capacity = self.config.group_capacity,
            "Chat service started"
        );

        BackgroundTasks {
            expiry: self.bus().spawn_sweep_task(),
            idle: self.registry.spawn_sweep_task(),
        }
    }

    /// Run the background sweeps until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let tasks = self.start();
        shutdown.await;
        tracing::info!("Shutdown signal received");
        tasks.abort();
    }

    /// Snapshot of service counters
    pub async fn stats(&self) -> ServiceStats {
        let bus = self.bus();
        ServiceStats {
            active_sessions: self.registry.session_count().await as u64,
            active_groups: self.allocator().group_count().await as u64,
            active_buckets: self.allocator().bucket_count().await as u64,
            messages_published: bus.published_count(),
            messages_expired: bus.expired_count(),
            messages_dropped: bus.dropped_count(),
            sessions_timed_out: self.registry.timed_out_count(),
        }
    }
}

impl Default for ChatService {
    fn default() -> Self {
        Self::new(ChatConfig::default())
    }
}

/// Handles of the background sweep tasks
pub struct BackgroundTasks {
    expiry: JoinHandle<()>,
    idle: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Stop both sweeps
    pub fn abort(&self) {
        self.expiry.abort();
        self.idle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.expiry.is_finished() && self.idle.is_finished()
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.abort();
    }
}
