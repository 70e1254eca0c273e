//! Status - serializable view of a session's current holding.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{AssignmentName, HolderId, Lease};

/// Snapshot of what one instance holds right now. This is the hook for
/// whatever ops surface the embedding service exposes (health endpoint,
/// periodic status log).
#[derive(Debug, Clone, Serialize)]
pub struct LeaseStatus {
    pub instance_id: HolderId,
    pub held: bool,
    pub assignment: Option<AssignmentName>,
    pub lease_id: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LeaseStatus {
    pub(crate) fn from_holding(instance_id: &HolderId, held: Option<&Lease>) -> Self {
        Self {
            instance_id: instance_id.clone(),
            held: held.is_some(),
            assignment: held.map(|l| l.assignment_name.clone()),
            lease_id: held.map(|l| l.id),
            expires_at: held.and_then(|l| l.lock_expires_at),
        }
    }
}
