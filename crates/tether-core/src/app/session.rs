//! LeaseSession - per-instance lease state over a store.
//!
//! Owns the single in-memory belief about "the lease this instance holds".
//! The cached lease lives in a guarded cell rather than global state: the
//! acquisition gate and the keep-alive loop write it, everything else reads
//! it through [`LeaseSession::acquired_assignment_name`].

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::app::status::LeaseStatus;
use crate::config::LeaseConfig;
use crate::domain::{AssignmentName, HolderId, Lease, LeaseError};
use crate::ports::LeaseStore;

pub struct LeaseSession {
    store: Arc<dyn LeaseStore>,
    config: LeaseConfig,
    // Reads can come from any thread while a failed renewal clears the
    // cell, hence the lock. No await ever happens while it is held.
    held: RwLock<Option<Lease>>,
}

impl LeaseSession {
    pub fn new(store: Arc<dyn LeaseStore>, config: LeaseConfig) -> Self {
        Self {
            store,
            config,
            held: RwLock::new(None),
        }
    }

    pub fn instance_id(&self) -> &HolderId {
        &self.config.instance_id
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Claim one assignment from the pool.
    ///
    /// `Err(Unavailable)` when no row is free (or a race was lost); the
    /// cached state is only overwritten on success, so a failed repeat
    /// attempt leaves any earlier holding intact.
    pub async fn acquire_lease(&self) -> Result<Lease, LeaseError> {
        let holder = &self.config.instance_id;
        debug!(
            instance_id = %holder,
            duration_secs = self.config.lease_duration.as_secs(),
            "attempting lease acquisition",
        );

        match self.store.acquire(holder, self.config.lease_duration).await? {
            Some(lease) => {
                info!(
                    instance_id = %holder,
                    assignment = %lease.assignment_name,
                    lease_id = lease.id,
                    "acquired lease",
                );
                *self.write_cell() = Some(lease.clone());
                Ok(lease)
            }
            None => {
                warn!(instance_id = %holder, "no available lease to acquire");
                Err(LeaseError::Unavailable)
            }
        }
    }

    /// Extend the held lease. `Ok(false)` when nothing is held, or when the
    /// store reports the lease lost — in the latter case the cache is
    /// cleared and this instance must assume it owns nothing. Storage
    /// errors propagate and leave the cache untouched.
    pub async fn renew_lease(&self) -> Result<bool, LeaseError> {
        if self.held_lease().is_none() {
            debug!("no lease to renew");
            return Ok(false);
        }

        let holder = &self.config.instance_id;
        let renewed = self.store.renew(holder, self.config.lease_duration).await?;

        if renewed {
            // Re-read for the authoritative new expiry.
            if let Some(lease) = self.store.find_by_holder(holder).await? {
                debug!(
                    instance_id = %holder,
                    expires_at = ?lease.lock_expires_at,
                    "renewed lease",
                );
                *self.write_cell() = Some(lease);
            }
        } else {
            warn!(instance_id = %holder, "lease renewal failed; lease was lost");
            *self.write_cell() = None;
        }

        Ok(renewed)
    }

    /// Give the held lease back to the pool. Idempotent.
    pub async fn release_lease(&self) -> Result<bool, LeaseError> {
        let holder = &self.config.instance_id;
        if self.held_lease().is_none() {
            debug!(instance_id = %holder, "no lease to release");
            return Ok(false);
        }

        let released = self.store.release(holder).await?;
        if released {
            info!(instance_id = %holder, "released lease");
            *self.write_cell() = None;
        }
        Ok(released)
    }

    /// The lease this instance currently believes it holds.
    pub fn held_lease(&self) -> Option<Lease> {
        self.read_cell().clone()
    }

    /// Downstream read: the assignment name to use as group identity, or
    /// `None` before acquisition / after loss.
    pub fn acquired_assignment_name(&self) -> Option<AssignmentName> {
        self.read_cell()
            .as_ref()
            .map(|lease| lease.assignment_name.clone())
    }

    /// Serializable snapshot for ops surfaces.
    pub fn status(&self) -> LeaseStatus {
        LeaseStatus::from_holding(&self.config.instance_id, self.read_cell().as_ref())
    }

    fn read_cell(&self) -> std::sync::RwLockReadGuard<'_, Option<Lease>> {
        self.held.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cell(&self) -> std::sync::RwLockWriteGuard<'_, Option<Lease>> {
        self.held.write().unwrap_or_else(|e| e.into_inner())
    }
}
