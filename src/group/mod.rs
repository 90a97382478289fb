//! Capacity-bounded groups within a spatial bucket
//!
//! Every bucket holds an ordered list of groups, oldest first. A joining
//! session goes to the newest group that still has room; when every group is
//! full a new one is created. Empty groups are destroyed immediately, and the
//! allocator opens/closes the matching message bus channel in the same step,
//! so a group exists in the allocator exactly when it exists on the bus.
//!
//! ```text
//!   bucket "u09t"
//!   ┌────────────────┬────────────────┬──────────────┐
//!   │ u09t#1 150/150 │ u09t#4 150/150 │ u09t#9 12/150 │ ◄── assign()
//!   └────────────────┴────────────────┴──────────────┘
//! ```

pub mod allocator;
pub mod entry;
pub mod id;

pub use allocator::GroupAllocator;
pub use entry::{Group, GroupInfo};
pub use id::GroupId;
