//! Group identifiers

use crate::geo::BucketKey;

/// Identifies a group: the bucket it belongs to plus a sequence number
///
/// Sequence numbers come from one counter shared by all buckets, so they
/// increase within a bucket and are never handed out twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId {
    bucket: BucketKey,
    seq: u64,
}

impl GroupId {
    pub fn new(bucket: BucketKey, seq: u64) -> Self {
        Self { bucket, seq }
    }

    pub fn bucket(&self) -> &BucketKey {
        &self.bucket
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.bucket, self.seq)
    }
}
