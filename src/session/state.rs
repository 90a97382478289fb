//! Session state machine

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::geo::{BucketKey, Coordinate, Radius};
use crate::group::GroupId;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, waiting for its first group
    Joining,
    /// In a group
    Active,
    /// Moving to a group of another bucket
    Reassigning,
    /// Removed; no further operations are accepted
    Left,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: SessionId,

    /// Name shown next to the session's messages
    pub display_name: Arc<str>,

    /// Last reported location
    pub coordinate: Coordinate,

    /// Chosen chat radius
    pub radius: Radius,

    /// Bucket derived from coordinate and radius
    pub bucket: BucketKey,

    /// Current group; `None` only while joining
    pub group: Option<GroupId>,

    /// Current phase
    pub phase: SessionPhase,

    /// When the session joined
    pub joined_at: Instant,

    /// Last time the client was heard from
    pub last_seen: Instant,

    /// Number of completed group moves
    pub reassignments: u32,
}

impl SessionState {
    /// Create a session in the `Joining` phase
    pub fn new(
        id: SessionId,
        display_name: &str,
        coordinate: Coordinate,
        radius: Radius,
        bucket: BucketKey,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            display_name: Arc::from(display_name),
            coordinate,
            radius,
            bucket,
            group: None,
            phase: SessionPhase::Joining,
            joined_at: now,
            last_seen: now,
            reassignments: 0,
        }
    }

    /// First group assigned
    pub fn activate(&mut self, group: GroupId) {
        if self.phase == SessionPhase::Joining {
            self.group = Some(group);
            self.phase = SessionPhase::Active;
        }
    }

    /// Start moving to another bucket
    pub fn begin_reassign(&mut self) {
        if self.phase == SessionPhase::Active {
            self.phase = SessionPhase::Reassigning;
        }
    }

    /// Finish a move
    pub fn complete_reassign(
        &mut self,
        coordinate: Coordinate,
        radius: Radius,
        bucket: BucketKey,
        group: GroupId,
    ) {
        if self.phase == SessionPhase::Reassigning {
            self.coordinate = coordinate;
            self.radius = radius;
            self.bucket = bucket;
            self.group = Some(group);
            self.reassignments += 1;
            self.phase = SessionPhase::Active;
        }
    }

    /// Mark the session as gone, returning the group it was in
    pub fn mark_left(&mut self) -> Option<GroupId> {
        self.phase = SessionPhase::Left;
        self.group.take()
    }

    /// Record client activity
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_left(&self) -> bool {
        self.phase == SessionPhase::Left
    }

    /// Whether the session has not been seen for `timeout` at `now`
    pub fn is_idle(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) >= timeout
    }

    /// Snapshot for observers
    pub fn info(&self) -> SessionInfo {
        let phase = match self.phase {
            SessionPhase::Left => SessionPhase::Left,
            _ => SessionPhase::Active,
        };

        SessionInfo {
            id: self.id,
            display_name: self.display_name.to_string(),
            coordinate: self.coordinate,
            radius: self.radius,
            bucket: self.bucket.clone(),
            group: self.group.clone(),
            phase,
            joined_at: self.joined_at,
            last_seen: self.last_seen,
        }
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub display_name: String,
    pub coordinate: Coordinate,
    pub radius: Radius,
    pub bucket: BucketKey,
    pub group: Option<GroupId>,
    /// Always `Active` or `Left`
    pub phase: SessionPhase,
    pub joined_at: Instant,
    pub last_seen: Instant,
}
