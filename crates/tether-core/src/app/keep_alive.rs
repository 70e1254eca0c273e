//! Keep-alive loop: periodic lease renewal for the process lifetime.
//!
//! One task, one timer. Each tick renews the held lease; a tick that
//! observes loss attempts bounded re-acquisition with jittered backoff,
//! and storage errors are logged and swallowed so a single failed attempt
//! never breaks the schedule. Shutdown releases the lease before the task
//! exits so the row returns to the pool immediately instead of waiting
//! out its expiry.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::session::LeaseSession;
use crate::domain::LeaseError;

/// Bounded re-acquisition after lease loss.
///
/// A loss tick runs up to `max_attempts` immediate acquisition tries,
/// sleeping `initial_backoff * 2^n` plus jitter between them. Exhausting
/// the budget degrades to "holding nothing"; later ticks observe the empty
/// holding and try again at the loop's natural period.
#[derive(Debug, Clone)]
pub struct ReacquirePolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for ReacquirePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

impl ReacquirePolicy {
    /// Never try to re-acquire; loss only degrades and logs.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
        }
    }
}

/// Handle to the spawned keep-alive task.
///
/// Hold this for the process lifetime. [`KeepAlive::shutdown_and_join`]
/// stops the loop gracefully, releasing the lease on the way out;
/// dropping the handle requests the same stop without waiting for it.
pub struct KeepAlive {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl KeepAlive {
    /// Spawn the renewal task for `session`, ticking at the session's
    /// configured renewal interval.
    pub fn spawn(session: Arc<LeaseSession>, policy: ReacquirePolicy) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(run(session, policy, shutdown_rx));
        Self { shutdown_tx, join }
    }

    /// Request shutdown without waiting.
    pub fn request_shutdown(&self) {
        // ignore send error: the task may already have stopped
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the loop and wait for it to release the lease and exit.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn run(
    session: Arc<LeaseSession>,
    policy: ReacquirePolicy,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = session.config().renewal_interval;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // interval() fires immediately; consume that so the first renewal
    // happens one full period after acquisition.
    ticker.tick().await;

    debug!(period_secs = period.as_secs(), "keep-alive loop started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender means the handle is gone; stop too.
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                tick(&session, &policy).await;
            }
        }
    }

    // Graceful exit: hand the row back instead of letting it expire.
    match session.release_lease().await {
        Ok(true) => info!("keep-alive shutdown: lease released"),
        Ok(false) => debug!("keep-alive shutdown: nothing to release"),
        Err(err) => warn!(error = %err, "keep-alive shutdown: release failed; lease will expire on its own"),
    }
}

async fn tick(session: &LeaseSession, policy: &ReacquirePolicy) {
    match session.renew_lease().await {
        Ok(true) => {}
        Ok(false) => {
            warn!("lease keep-alive found no held lease; attempting re-acquisition");
            reacquire(session, policy).await;
        }
        // Transient storage trouble: keep the schedule, retry next tick.
        Err(err) => error!(error = %err, "lease renewal attempt failed"),
    }
}

async fn reacquire(session: &LeaseSession, policy: &ReacquirePolicy) {
    let mut backoff = policy.initial_backoff;
    for attempt in 1..=policy.max_attempts {
        match session.acquire_lease().await {
            Ok(lease) => {
                info!(
                    assignment = %lease.assignment_name,
                    attempt,
                    "re-acquired a lease after loss",
                );
                return;
            }
            Err(LeaseError::Unavailable) => {
                warn!(attempt, max = policy.max_attempts, "re-acquisition: pool exhausted");
            }
            Err(err) => {
                warn!(attempt, error = %err, "re-acquisition attempt failed");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(with_jitter(backoff)).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    if policy.max_attempts > 0 {
        warn!("re-acquisition budget exhausted; continuing without an assignment");
    }
}

/// Add up to 25% random jitter so instances that lost leases together do
/// not hammer the pool in lockstep.
fn with_jitter(backoff: Duration) -> Duration {
    let max_extra = backoff.as_millis() as u64 / 4;
    if max_extra == 0 {
        return backoff;
    }
    backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=max_extra))
}
