//! Lease - one claimable assignment slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AssignmentName, HolderId};

/// One row of the lease pool.
///
/// Rows are seeded out-of-band; the manager only ever mutates `holder_id`,
/// `locked_at`, `lock_expires_at`, and `updated_at`. `id` defines the scan
/// order for acquisition, `assignment_name` is immutable once seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub assignment_name: AssignmentName,
    pub holder_id: Option<HolderId>,
    pub locked_at: Option<DateTime<Utc>>,
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lease {
    /// Availability is a derived predicate, never stored: a lease is free
    /// when no holder is recorded, or when its expiry has passed (the
    /// holder crashed and never released).
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        match (&self.holder_id, self.lock_expires_at) {
            (None, _) => true,
            (Some(_), Some(expires_at)) => expires_at < now,
            // Holder without expiry should not happen; treat as held so a
            // malformed row can never be double-claimed.
            (Some(_), None) => false,
        }
    }

    /// Whether `holder` currently owns this lease and the lock is unexpired.
    pub fn is_held_by(&self, holder: &HolderId, now: DateTime<Utc>) -> bool {
        self.holder_id.as_ref() == Some(holder) && !self.is_available(now)
    }
}
