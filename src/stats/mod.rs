//! Service statistics

pub mod metrics;

pub use metrics::{Counter, ServiceStats};
