//! In-memory lease store implementation.
//!
//! Development and test backend. The pool is a `Vec<Lease>` behind a tokio
//! `Mutex`; holding the mutex plays the role of the SQL transaction, and
//! the scan / conditional-update split mirrors the `SELECT ... FOR UPDATE`
//! + guarded `UPDATE` pair of the Postgres backend so the same races can be
//! exercised here. An optional race window re-opens the gap between the two
//! steps, which a real row lock would keep closed, so tests can drive
//! concurrent acquirers straight into the conditional-update guard.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{AssignmentName, HolderId, Lease, LeaseError};
use crate::ports::{Clock, LeaseStore, SystemClock};

/// Lease pool backed by process memory.
pub struct InMemoryLeaseStore {
    rows: Arc<Mutex<Vec<Lease>>>,
    clock: Arc<dyn Clock>,
    race_window: Duration,
}

impl InMemoryLeaseStore {
    /// Seed a pool with the given assignment names; ids are assigned in
    /// order starting at 1, which fixes the acquisition scan order.
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<AssignmentName>,
    {
        Self::with_clock(names, Arc::new(SystemClock))
    }

    pub fn with_clock<I, N>(names: I, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<AssignmentName>,
    {
        let now = clock.now();
        let rows = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Lease {
                id: i as i64 + 1,
                assignment_name: name.into(),
                holder_id: None,
                locked_at: None,
                lock_expires_at: None,
                created_at: now,
                updated_at: now,
            })
            .collect();
        Self {
            rows: Arc::new(Mutex::new(rows)),
            clock,
            race_window: Duration::ZERO,
        }
    }

    /// Inject an artificial delay between the availability scan and the
    /// conditional update, widening the race that the update guard must
    /// close.
    pub fn with_race_window(mut self, window: Duration) -> Self {
        self.race_window = window;
        self
    }

    /// Snapshot of the whole pool, in id order.
    pub async fn snapshot(&self) -> Vec<Lease> {
        self.rows.lock().await.clone()
    }

    fn expiry_for(&self, now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
        let span = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        now.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn acquire(
        &self,
        holder: &HolderId,
        duration: Duration,
    ) -> Result<Option<Lease>, LeaseError> {
        // Scan phase: lowest-id available row.
        let candidate = {
            let rows = self.rows.lock().await;
            let now = self.clock.now();
            rows.iter().find(|l| l.is_available(now)).map(|l| l.id)
        };
        let Some(id) = candidate else {
            return Ok(None);
        };

        if !self.race_window.is_zero() {
            tokio::time::sleep(self.race_window).await;
        }

        // Conditional-update phase: re-check availability under the lock;
        // a concurrent acquirer that committed first makes this a no-op.
        let mut rows = self.rows.lock().await;
        let now = self.clock.now();
        let Some(row) = rows.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        if !row.is_available(now) {
            return Ok(None);
        }
        row.holder_id = Some(holder.clone());
        row.locked_at = Some(now);
        row.lock_expires_at = Some(self.expiry_for(now, duration));
        row.updated_at = now;

        // Read back by holder, as the contract specifies.
        let acquired = rows
            .iter()
            .find(|l| l.holder_id.as_ref() == Some(holder))
            .cloned();
        Ok(acquired)
    }

    async fn release(&self, holder: &HolderId) -> Result<bool, LeaseError> {
        let mut rows = self.rows.lock().await;
        let now = self.clock.now();
        let mut released = false;
        for row in rows.iter_mut() {
            if row.holder_id.as_ref() == Some(holder) {
                row.holder_id = None;
                row.locked_at = None;
                row.lock_expires_at = None;
                row.updated_at = now;
                released = true;
            }
        }
        Ok(released)
    }

    async fn renew(&self, holder: &HolderId, duration: Duration) -> Result<bool, LeaseError> {
        let mut rows = self.rows.lock().await;
        let now = self.clock.now();
        // Holder match alone is not enough: an expired lock is already up
        // for grabs and must not be resurrected by a late renewal.
        let Some(row) = rows.iter_mut().find(|l| l.is_held_by(holder, now)) else {
            return Ok(false);
        };
        row.lock_expires_at = Some(self.expiry_for(now, duration));
        row.updated_at = now;
        Ok(true)
    }

    async fn find_by_holder(&self, holder: &HolderId) -> Result<Option<Lease>, LeaseError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|l| l.holder_id.as_ref() == Some(holder))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;
    use chrono::TimeZone;
    use std::collections::HashSet;

    const LEASE_30S: Duration = Duration::from_secs(30);

    fn manual_clock() -> Arc<ManualClock> {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Arc::new(ManualClock::new(start))
    }

    #[tokio::test]
    async fn acquire_scans_in_id_order() {
        let store = InMemoryLeaseStore::new(["g-a", "g-b", "g-c"]);

        let first = store
            .acquire(&HolderId::new("x"), LEASE_30S)
            .await
            .unwrap()
            .unwrap();
        let second = store
            .acquire(&HolderId::new("y"), LEASE_30S)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.assignment_name.as_str(), "g-a");
        assert_eq!(second.assignment_name.as_str(), "g-b");
        assert_eq!(first.holder_id, Some(HolderId::new("x")));
        assert!(first.lock_expires_at.is_some());
    }

    #[tokio::test]
    async fn exhausted_pool_returns_none_without_side_effects() {
        let store = InMemoryLeaseStore::new(["g-a"]);

        assert!(store.acquire(&HolderId::new("x"), LEASE_30S).await.unwrap().is_some());
        assert!(store.acquire(&HolderId::new("y"), LEASE_30S).await.unwrap().is_none());

        // The held row is untouched by the failed attempt.
        let rows = store.snapshot().await;
        assert_eq!(rows[0].holder_id, Some(HolderId::new("x")));
    }

    #[tokio::test]
    async fn release_frees_the_row_and_is_idempotent() {
        let store = InMemoryLeaseStore::new(["g-a"]);
        let x = HolderId::new("x");

        store.acquire(&x, LEASE_30S).await.unwrap().unwrap();
        assert!(store.release(&x).await.unwrap());
        assert!(!store.release(&x).await.unwrap());

        // A different holder now gets the same row.
        let lease = store
            .acquire(&HolderId::new("y"), LEASE_30S)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.id, 1);
        assert_eq!(lease.assignment_name.as_str(), "g-a");
    }

    #[tokio::test]
    async fn renew_extends_expiry_from_now() {
        let clock = manual_clock();
        let store = InMemoryLeaseStore::with_clock(["g-a"], clock.clone());
        let x = HolderId::new("x");

        let lease = store.acquire(&x, LEASE_30S).await.unwrap().unwrap();
        let t0 = clock.now();
        assert_eq!(lease.lock_expires_at, Some(t0 + chrono::Duration::seconds(30)));

        clock.advance(Duration::from_secs(25));
        assert!(store.renew(&x, LEASE_30S).await.unwrap());

        let row = store.find_by_holder(&x).await.unwrap().unwrap();
        // New expiry is relative to the renewal instant: t0 + 25 + 30.
        assert_eq!(row.lock_expires_at, Some(t0 + chrono::Duration::seconds(55)));
        // locked_at records the acquisition, not the renewal.
        assert_eq!(row.locked_at, Some(t0));
    }

    #[tokio::test]
    async fn renew_fails_after_expiry_even_with_matching_holder() {
        let clock = manual_clock();
        let store = InMemoryLeaseStore::with_clock(["g-a"], clock.clone());
        let x = HolderId::new("x");

        store.acquire(&x, LEASE_30S).await.unwrap().unwrap();
        clock.advance(Duration::from_secs(31));

        // holder_id still says "x", but expiry takes precedence.
        assert!(!store.renew(&x, LEASE_30S).await.unwrap());
        let row = store.find_by_holder(&x).await.unwrap().unwrap();
        assert!(row.is_available(clock.now()));
    }

    #[tokio::test]
    async fn renew_at_the_exact_expiry_instant_succeeds() {
        let clock = manual_clock();
        let store = InMemoryLeaseStore::with_clock(["g-a"], clock.clone());
        let x = HolderId::new("x");

        let t0 = clock.now();
        store.acquire(&x, LEASE_30S).await.unwrap().unwrap();
        clock.advance(Duration::from_secs(30));

        // At exactly `lock_expires_at == now` the row is not yet claimable
        // by anyone else, so the holder's renewal still lands.
        assert!(store.acquire(&HolderId::new("rival"), LEASE_30S).await.unwrap().is_none());
        assert!(store.renew(&x, LEASE_30S).await.unwrap());

        let row = store.find_by_holder(&x).await.unwrap().unwrap();
        assert_eq!(row.lock_expires_at, Some(t0 + chrono::Duration::seconds(60)));
    }

    #[tokio::test]
    async fn renew_fails_for_a_holder_with_no_lease() {
        let store = InMemoryLeaseStore::new(["g-a"]);

        assert!(!store.renew(&HolderId::new("nobody"), LEASE_30S).await.unwrap());
        // And it must not have created one.
        assert!(store.find_by_holder(&HolderId::new("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn steady_renewal_keeps_other_instances_out() {
        let clock = manual_clock();
        let store = InMemoryLeaseStore::with_clock(["g-a"], clock.clone());
        let owner = HolderId::new("owner");
        let rival = HolderId::new("rival");

        store.acquire(&owner, LEASE_30S).await.unwrap().unwrap();

        for _ in 0..4 {
            clock.advance(Duration::from_secs(20));
            assert!(store.renew(&owner, LEASE_30S).await.unwrap());
            assert!(store.acquire(&rival, LEASE_30S).await.unwrap().is_none());
        }

        // Renewals stop; one expiry later the rival takes over.
        clock.advance(Duration::from_secs(31));
        let stolen = store.acquire(&rival, LEASE_30S).await.unwrap().unwrap();
        assert_eq!(stolen.assignment_name.as_str(), "g-a");
        assert_eq!(stolen.holder_id, Some(rival));
    }

    #[tokio::test]
    async fn expired_lease_is_reassigned_to_a_new_holder() {
        let clock = manual_clock();
        let store = InMemoryLeaseStore::with_clock(["g-a"], clock.clone());

        store.acquire(&HolderId::new("dead"), LEASE_30S).await.unwrap().unwrap();
        clock.advance(Duration::from_secs(31));

        let lease = store
            .acquire(&HolderId::new("successor"), LEASE_30S)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.holder_id, Some(HolderId::new("successor")));

        // The previous holder's late renewal must fail, not resurrect.
        assert!(!store.renew(&HolderId::new("dead"), LEASE_30S).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_acquirers_never_share_an_assignment() {
        let store = Arc::new(
            InMemoryLeaseStore::new(["g-a", "g-b", "g-c"])
                .with_race_window(Duration::from_millis(10)),
        );

        let mut handles = Vec::new();
        for i in 0..5 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let holder = HolderId::new(format!("instance-{i}"));
                // A lost race surfaces as None; re-invoking acquire scans
                // the next available row, so retry a bounded number of
                // times the way a caller would.
                for _ in 0..10 {
                    if let Some(lease) = store.acquire(&holder, LEASE_30S).await.unwrap() {
                        return Some(lease);
                    }
                }
                None
            }));
        }

        let mut names = HashSet::new();
        let mut losers = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Some(lease) => {
                    // Every winner holds a distinct assignment.
                    assert!(names.insert(lease.assignment_name.clone()));
                }
                None => losers += 1,
            }
        }

        // Pool of 3, 5 acquirers: exactly 3 succeed, 2 walk away empty.
        assert_eq!(names.len(), 3);
        assert_eq!(losers, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn conditional_update_loses_gracefully_on_a_shared_row() {
        let store = Arc::new(
            InMemoryLeaseStore::new(["g-a"]).with_race_window(Duration::from_millis(20)),
        );

        // Both acquirers scan the same single row inside the race window;
        // the guard lets exactly one through.
        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.acquire(&HolderId::new("a"), LEASE_30S).await.unwrap() })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.acquire(&HolderId::new("b"), LEASE_30S).await.unwrap() })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() ^ b.is_some());
    }
}
