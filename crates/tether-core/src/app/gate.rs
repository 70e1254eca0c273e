//! Acquisition gate: startup-blocking lease claim.
//!
//! Everything that needs the assignment name (the message-consumer
//! configuration) must be constructed *after* this gate has run. Starting
//! to consume without an owned assignment would fall back to a shared
//! default identity and break mutual exclusion across instances, so a
//! failed claim here is fatal to startup by design.

use std::sync::Arc;

use tracing::{error, info};

use crate::app::session::LeaseSession;
use crate::domain::{AssignmentName, LeaseError};

pub struct AcquisitionGate {
    session: Arc<LeaseSession>,
}

impl AcquisitionGate {
    pub fn new(session: Arc<LeaseSession>) -> Self {
        Self { session }
    }

    /// Claim an assignment, publishing it through the session on success.
    ///
    /// The caller must treat any `Err` as startup-fatal and refuse to
    /// serve. `Unavailable` (pool exhausted) is logged distinctly from
    /// storage failures.
    pub async fn claim(&self) -> Result<AssignmentName, LeaseError> {
        let instance_id = self.session.instance_id().clone();
        info!(instance_id = %instance_id, "acquiring assignment lease at startup");

        match self.session.acquire_lease().await {
            Ok(lease) => {
                info!("========================================");
                info!("assignment lease acquired:");
                info!("  assignment:  {}", lease.assignment_name);
                info!("  instance id: {instance_id}");
                info!("  lease id:    {}", lease.id);
                info!("========================================");
                Ok(lease.assignment_name)
            }
            Err(LeaseError::Unavailable) => {
                error!(
                    instance_id = %instance_id,
                    "no assignment lease available; service cannot start",
                );
                Err(LeaseError::Unavailable)
            }
            Err(err) => {
                error!(
                    instance_id = %instance_id,
                    error = %err,
                    "storage failure during startup lease acquisition",
                );
                Err(err)
            }
        }
    }
}
