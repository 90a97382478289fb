//! Error types
//!
//! A single error enum covers every public operation. Structural errors
//! (stale ids) are returned so the caller can re-join; group capacity
//! pressure never shows up here because the allocator absorbs it.

use crate::group::GroupId;
use crate::session::SessionId;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for chat service operations
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Latitude/longitude outside [-90, 90] / [-180, 180] or not finite
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// Geohash precision outside 1..=12
    InvalidPrecision(usize),
    /// Bucket key is empty, too long, or contains a non-geohash character
    InvalidBucketKey(String),
    /// Radius is not one of the accepted values
    InvalidRadius(u32),
    /// Session id is stale or was never issued
    UnknownSession(SessionId),
    /// Group was destroyed or never existed
    UnknownGroup(GroupId),
    /// Display name is blank
    EmptyDisplayName,
    /// Message text is blank
    EmptyMessage,
    /// Message text exceeds the configured limit
    MessageTooLong { len: usize, max: usize },
    /// Subscription ended (cancelled, group closed, or session left)
    SubscriptionClosed,
}

impl Error {
    /// Whether the caller has to join again to recover
    pub fn requires_rejoin(&self) -> bool {
        matches!(self, Error::UnknownSession(_) | Error::UnknownGroup(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(f, "Invalid coordinate: ({}, {})", latitude, longitude),
            Error::InvalidPrecision(p) => write!(f, "Invalid geohash precision: {}", p),
            Error::InvalidBucketKey(key) => write!(f, "Invalid bucket key: {:?}", key),
            Error::InvalidRadius(m) => write!(f, "Unsupported radius: {}m", m),
            Error::UnknownSession(id) => write!(f, "Unknown session: {}", id),
            Error::UnknownGroup(id) => write!(f, "Unknown group: {}", id),
            Error::EmptyDisplayName => write!(f, "Display name must not be empty"),
            Error::EmptyMessage => write!(f, "Message must not be empty"),
            Error::MessageTooLong { len, max } => {
                write!(f, "Message too long: {} characters (max {})", len, max)
            }
            Error::SubscriptionClosed => write!(f, "Subscription closed"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BucketKey;

    #[test]
    fn test_requires_rejoin() {
        assert!(Error::UnknownSession(SessionId::new(7)).requires_rejoin());
        assert!(Error::UnknownGroup(GroupId::new(BucketKey::from_raw("u09t"), 1)).requires_rejoin());
        assert!(!Error::EmptyMessage.requires_rejoin());
        assert!(!Error::SubscriptionClosed.requires_rejoin());
    }

    #[test]
    fn test_display() {
        let err = Error::MessageTooLong { len: 12, max: 10 };
        assert_eq!(err.to_string(), "Message too long: 12 characters (max 10)");

        let err = Error::UnknownGroup(GroupId::new(BucketKey::from_raw("u09t"), 3));
        assert_eq!(err.to_string(), "Unknown group: u09t#3");

        assert_eq!(Error::InvalidRadius(250).to_string(), "Unsupported radius: 250m");
    }
}
