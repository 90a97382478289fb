//! Participant sessions
//!
//! The registry is the entry point for the presentation layer: it creates
//! sessions, keeps each one in exactly one group, moves it when its location
//! or radius maps to another bucket, and removes it on leave or when its
//! heartbeat lapses.
//!
//! Session phases:
//!
//! ```text
//!   Joining ──► Active ──► Reassigning ──► Active ──► ... ──► Left
//! ```
//!
//! `Joining` and `Reassigning` only exist while the session's own lock is
//! held, so observers only ever see `Active` or `Left`.

pub mod registry;
pub mod state;
pub mod subscription;

pub use registry::{JoinInfo, Placement, SessionRegistry};
pub use state::{SessionId, SessionInfo, SessionPhase, SessionState};
pub use subscription::SessionSubscription;
