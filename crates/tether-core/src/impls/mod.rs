//! Lease store implementations.
//!
//! `memory` is always available (development and tests); `postgres` is the
//! production backend, behind the `postgres` feature.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use self::memory::InMemoryLeaseStore;

#[cfg(feature = "postgres")]
pub use self::postgres::PgLeaseStore;
