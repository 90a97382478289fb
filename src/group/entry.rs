//! Group membership

use tokio::time::Instant;

use crate::session::SessionId;

use super::id::GroupId;

/// Raised when admitting into a full group; the allocator handles it by
/// moving on to another group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct GroupFull;

/// A capacity-bounded set of sessions, ordered by join time
#[derive(Debug)]
pub struct Group {
    id: GroupId,
    members: Vec<SessionId>,
    capacity: usize,
    created_at: Instant,
}

impl Group {
    pub(super) fn new(id: GroupId, capacity: usize) -> Self {
        Self {
            id,
            members: Vec::new(),
            capacity,
            created_at: Instant::now(),
        }
    }

    /// New group holding its first member; capacity is at least one
    pub(super) fn founded_by(id: GroupId, capacity: usize, founder: SessionId) -> Self {
        let mut group = Self::new(id, capacity);
        group.members.push(founder);
        group
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.members.contains(&session_id)
    }

    /// Members in join order
    pub fn members(&self) -> &[SessionId] {
        &self.members
    }

    pub(super) fn admit(&mut self, session_id: SessionId) -> Result<(), GroupFull> {
        if self.is_full() {
            return Err(GroupFull);
        }
        self.members.push(session_id);
        Ok(())
    }

    /// Returns false if the session was not a member
    pub(super) fn remove(&mut self, session_id: SessionId) -> bool {
        match self.members.iter().position(|&m| m == session_id) {
            Some(pos) => {
                self.members.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn info(&self) -> GroupInfo {
        GroupInfo {
            id: self.id.clone(),
            size: self.members.len(),
            capacity: self.capacity,
            created_at: self.created_at,
        }
    }
}

/// Point-in-time view of a group
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub id: GroupId,
    pub size: usize,
    pub capacity: usize,
    pub created_at: Instant,
}
