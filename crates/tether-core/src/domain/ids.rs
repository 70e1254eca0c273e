//! Domain identifiers (strongly-typed strings).
//!
//! Holder identity and assignment name travel through the whole lease
//! lifecycle; keeping them as distinct newtypes means they cannot be
//! swapped at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identity of one service instance, as recorded in `holder_id`.
///
/// Usually supplied by the environment (`INSTANCE_ID`, container hostname).
/// Two live instances must never share a holder id; [`HolderId::generate`]
/// exists for environments that provide nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a unique holder id for instances with no configured identity.
    ///
    /// ULID-based so ids sort by creation time and need no coordination.
    pub fn generate() -> Self {
        Self(format!("instance-{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HolderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for HolderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Externally meaningful identity granted to whichever instance holds the
/// lease (e.g. a consumer-group name). Seeded at provisioning time and
/// never mutated by the lease manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentName(String);

impl AssignmentName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssignmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssignmentName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssignmentName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
