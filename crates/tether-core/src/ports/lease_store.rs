//! LeaseStore port - the transactional contract over the lease pool.
//!
//! The pool table is the single source of truth for who holds what; every
//! implementation must make each operation one atomic transaction. No
//! operation retries internally — retry policy lives with the callers
//! (the acquisition gate fails hard, the keep-alive loop waits a tick).

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{HolderId, Lease, LeaseError};

/// Transactional operations over the lease pool.
///
/// Mutual exclusion rests on two mechanisms working together: a pessimistic,
/// transaction-scoped row lock while scanning for a candidate, and a
/// conditional update that re-checks availability before writing. A racing
/// acquirer that loses either step simply observes "nothing acquired".
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Claim the lowest-id available row for `holder`, valid for `duration`.
    ///
    /// Returns `Ok(None)` when the pool has no available row, and also when
    /// the conditional update lost a race to a concurrent acquirer — the
    /// caller may simply call `acquire` again, which will scan the next
    /// available row. On success the returned lease is the post-update row
    /// read back by holder identity.
    async fn acquire(
        &self,
        holder: &HolderId,
        duration: Duration,
    ) -> Result<Option<Lease>, LeaseError>;

    /// Clear holder and lock timestamps on every row held by `holder`.
    ///
    /// Idempotent; `Ok(false)` when nothing was held.
    async fn release(&self, holder: &HolderId) -> Result<bool, LeaseError>;

    /// Extend the expiry of the row held by `holder` to `now + duration`.
    ///
    /// The guard requires the holder to match *and* the lock to be
    /// unexpired: a renewal arriving after expiry fails even if `holder_id`
    /// still carries this holder's name, so a late renewal can never
    /// clobber a lease that was reassigned in the meantime. `Ok(false)` is
    /// the sole signal of lease loss; renew must never create a lease.
    async fn renew(&self, holder: &HolderId, duration: Duration) -> Result<bool, LeaseError>;

    /// Non-locking read of the row currently owned by `holder`.
    async fn find_by_holder(&self, holder: &HolderId) -> Result<Option<Lease>, LeaseError>;
}
