//! Ports - trait seams toward external systems and the environment.

pub mod clock;
pub mod lease_store;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::lease_store::LeaseStore;
