//! Error taxonomy for lease operations.
//!
//! Lease *loss* is deliberately not an error: `renew` reports it as a plain
//! `false` so the keep-alive loop can react without unwinding.

use thiserror::Error;

/// Failures surfaced by lease stores and sessions.
#[derive(Debug, Error)]
pub enum LeaseError {
    /// Expected contention: no free row in the pool at acquisition time.
    /// Startup-fatal at the acquisition gate, retried by the keep-alive
    /// loop after a loss.
    #[error("no available lease in the pool")]
    Unavailable,

    /// Transient failure in the underlying store (connectivity, transaction
    /// aborts). Never retried inside the store; retry policy belongs to the
    /// caller.
    #[error("lease storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LeaseError {
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }
}
