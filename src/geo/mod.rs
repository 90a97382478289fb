//! Spatial bucketing
//!
//! Participants are grouped by the geohash cell their coordinate falls in.
//! The cell size is chosen from the participant's radius: a larger radius
//! maps to a shorter key, which covers a larger area.
//!
//! ```text
//!   Coordinate ──► cell::encode(precision) ──► BucketKey "u09t"
//!                                                 │
//!                      neighbors() ◄──────────────┘
//!              ┌──────┬──────┬──────┐
//!              │ u09q │ u09w │ u09y │
//!              ├──────┼──────┼──────┤
//!              │ u09m │ u09t │ u09v │
//!              ├──────┼──────┼──────┤
//!              │ u09k │ u09s │ u09u │
//!              └──────┴──────┴──────┘
//! ```

pub mod cell;
pub mod coordinate;
pub mod index;
pub mod radius;

pub use cell::{BoundingBox, BucketKey, MAX_PRECISION};
pub use coordinate::Coordinate;
pub use index::GeoIndex;
pub use radius::Radius;
