//! Domain model (identifiers, the lease row, error taxonomy).

pub mod errors;
pub mod ids;
pub mod lease;

pub use self::errors::LeaseError;
pub use self::ids::{AssignmentName, HolderId};
pub use self::lease::Lease;
