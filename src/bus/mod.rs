//! Ephemeral message bus
//!
//! Each live group owns a channel: a short log of recent messages and a
//! `tokio::sync::broadcast` sender used for fan-out to subscribers.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<MessageBus>
//!                     ┌─────────────────────────┐
//!                     │ groups: HashMap<GroupId,│
//!                     │   GroupChannel {        │
//!                     │     log: VecDeque,      │
//!                     │     tx: broadcast::Tx,  │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!     [Sender]              [Subscriber]            [Subscriber]
//!     publish()             sub.recv()              sub.recv()
//!         │                       ▲                       ▲
//!         └──► channel.append() ──┴───────────────────────┘
//!
//!     [expiry sweep] ──► channel.expire(ttl)   (every sweep interval)
//! ```
//!
//! # Delivery
//!
//! Publication on a group is serialized by the channel lock, so every
//! subscriber sees that group's messages in publish order. Messages are
//! shared as `Arc<Message>`; fan-out copies a pointer, not the text.
//!
//! Each subscriber reads through its own cursor into a bounded ring of
//! `subscriber_buffer` messages. A subscriber that falls further behind loses
//! the oldest messages it has not read yet; others are unaffected.

pub mod channel;
pub mod message;
pub mod store;
pub mod subscription;

pub use channel::ChannelStats;
pub use message::Message;
pub use store::MessageBus;
pub use subscription::Subscription;
