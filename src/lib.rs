//! Ephemeral proximity group chat
//!
//! Participants are bucketed by the geohash cell of their location, placed
//! into capacity-bounded groups inside that bucket, and exchange messages that
//! vanish after a fixed time-to-live.
//!
//! ```no_run
//! use ephemeral_meet::{ChatConfig, ChatService, Coordinate, Radius};
//!
//! # async fn demo() -> ephemeral_meet::Result<()> {
//! let service = ChatService::new(ChatConfig::from_env());
//! let _tasks = service.start();
//!
//! let here = Coordinate::new(48.8566, 2.3522)?;
//! let alice = service.registry().join(here, Radius::Meters1000, "alice").await?;
//! let mut feed = service.registry().subscribe(alice.session_id).await?;
//!
//! service.registry().send(alice.session_id, "hi").await?;
//! let message = feed.recv().await?;
//! assert_eq!(message.text(), "hi");
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod geo;
pub mod group;
pub mod service;
pub mod session;
pub mod stats;

pub use bus::{Message, MessageBus, Subscription};
pub use config::ChatConfig;
pub use error::{Error, Result};
pub use geo::{BucketKey, Coordinate, GeoIndex, Radius};
pub use group::{GroupAllocator, GroupId};
pub use service::{BackgroundTasks, ChatService};
pub use session::{JoinInfo, Placement, SessionId, SessionRegistry, SessionSubscription};
pub use stats::ServiceStats;
