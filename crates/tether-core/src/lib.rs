//! tether-core
//!
//! Lease-based coordination for identical service instances sharing a
//! fixed pool of named assignments (consumer-group identities). One
//! relational table is the single source of truth; there is no external
//! lock manager and no consensus protocol.
//!
//! # Module layout
//! - **domain**: the lease row, identifiers, error taxonomy
//! - **ports**: trait seams (`LeaseStore`, `Clock`)
//! - **impls**: store backends (in-memory; PostgreSQL behind the
//!   `postgres` feature)
//! - **app**: per-instance session, startup acquisition gate, keep-alive
//!   loop
//! - **config**: instance identity and timing knobs
//!
//! # Lifecycle
//! At startup the [`app::AcquisitionGate`] claims one free assignment
//! through the [`app::LeaseSession`] and fails hard when none is
//! available. Afterwards [`app::KeepAlive`] renews the lease on a fixed
//! interval (strictly shorter than the lease duration) for the rest of
//! the process lifetime. A crashed instance never releases; its rows
//! simply pass `lock_expires_at` and become claimable again.

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::app::{AcquisitionGate, KeepAlive, LeaseSession, LeaseStatus, ReacquirePolicy};
pub use crate::config::{ConfigError, LeaseConfig};
pub use crate::domain::{AssignmentName, HolderId, Lease, LeaseError};
pub use crate::impls::InMemoryLeaseStore;
pub use crate::ports::{Clock, LeaseStore, ManualClock, SystemClock};

#[cfg(feature = "postgres")]
pub use crate::impls::PgLeaseStore;
