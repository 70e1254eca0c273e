//! Lease configuration: instance identity and timing knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::domain::HolderId;

/// How long an acquired lease stays valid without renewal.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(30);

/// How often the keep-alive loop renews. Must stay below the lease
/// duration or a healthy instance can lose its lease between ticks.
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(20);

const ENV_INSTANCE_ID: &str = "INSTANCE_ID";
const ENV_HOSTNAME: &str = "HOSTNAME";
const ENV_LEASE_DURATION: &str = "TETHER_LEASE_DURATION_SECS";
const ENV_RENEWAL_INTERVAL: &str = "TETHER_LEASE_RENEWAL_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The operator invariant `renewal_interval < lease_duration` does not
    /// hold; running like this admits a window where a healthy instance
    /// expires before its next renewal.
    #[error("renewal interval {renewal:?} must be shorter than lease duration {duration:?}")]
    RenewalNotShorter { renewal: Duration, duration: Duration },

    #[error("invalid value {value:?} for {var}: expected whole seconds > 0")]
    InvalidEnv { var: &'static str, value: String },
}

/// Per-instance lease settings, fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// This instance's holder identity.
    pub instance_id: HolderId,
    /// Validity window written into `lock_expires_at` on acquire and renew.
    pub lease_duration: Duration,
    /// Keep-alive tick period.
    pub renewal_interval: Duration,
}

impl LeaseConfig {
    /// Build a validated config. Rejects `renewal_interval >= lease_duration`.
    pub fn new(
        instance_id: HolderId,
        lease_duration: Duration,
        renewal_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if renewal_interval >= lease_duration {
            return Err(ConfigError::RenewalNotShorter {
                renewal: renewal_interval,
                duration: lease_duration,
            });
        }
        Ok(Self {
            instance_id,
            lease_duration,
            renewal_interval,
        })
    }

    /// Defaults (30s lease, 20s renewal) for the given instance identity.
    pub fn with_defaults(instance_id: HolderId) -> Self {
        Self {
            instance_id,
            lease_duration: DEFAULT_LEASE_DURATION,
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
        }
    }

    /// Read the configuration from the environment.
    ///
    /// Identity comes from `INSTANCE_ID`, then `HOSTNAME`, then a generated
    /// ULID identity — a shared fallback name would silently break holder
    /// uniqueness across instances. Durations come from
    /// `TETHER_LEASE_DURATION_SECS` / `TETHER_LEASE_RENEWAL_SECS` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    // The actual loading logic, over an injected variable lookup so it can
    // be tested without mutating process-wide environment state.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let instance_id = resolve_instance_id_from(&lookup);
        let lease_duration =
            env_secs(ENV_LEASE_DURATION, &lookup)?.unwrap_or(DEFAULT_LEASE_DURATION);
        let renewal_interval =
            env_secs(ENV_RENEWAL_INTERVAL, &lookup)?.unwrap_or(DEFAULT_RENEWAL_INTERVAL);
        Self::new(instance_id, lease_duration, renewal_interval)
    }
}

/// Resolve this instance's holder identity from the environment.
pub fn resolve_instance_id() -> HolderId {
    resolve_instance_id_from(&|var| std::env::var(var).ok())
}

fn resolve_instance_id_from(lookup: &impl Fn(&str) -> Option<String>) -> HolderId {
    for var in [ENV_INSTANCE_ID, ENV_HOSTNAME] {
        if let Some(value) = lookup(var) {
            let value = value.trim();
            if !value.is_empty() {
                return HolderId::new(value);
            }
        }
    }
    let generated = HolderId::generate();
    info!(instance_id = %generated, "no instance identity in environment; generated one");
    generated
}

fn env_secs(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<Duration>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var,
                value: raw.clone(),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidEnv { var, value: raw });
            }
            Ok(Some(Duration::from_secs(secs)))
        }
    }
}
