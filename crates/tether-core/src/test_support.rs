//! Test doubles shared across module tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{HolderId, Lease, LeaseError};
use crate::ports::LeaseStore;

/// Wraps a working store and fails selected operations on demand with a
/// storage error, so callers' error arms can be driven deterministically.
pub(crate) struct FaultyStore {
    inner: Arc<dyn LeaseStore>,
    fail_acquire: AtomicBool,
    fail_release: AtomicBool,
    fail_renew: AtomicBool,
    fail_find: AtomicBool,
}

impl FaultyStore {
    pub fn wrap(inner: Arc<dyn LeaseStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_acquire: AtomicBool::new(false),
            fail_release: AtomicBool::new(false),
            fail_renew: AtomicBool::new(false),
            fail_find: AtomicBool::new(false),
        })
    }

    pub fn fail_acquire(&self, on: bool) {
        self.fail_acquire.store(on, Ordering::SeqCst);
    }

    pub fn fail_release(&self, on: bool) {
        self.fail_release.store(on, Ordering::SeqCst);
    }

    pub fn fail_renew(&self, on: bool) {
        self.fail_renew.store(on, Ordering::SeqCst);
    }

    pub fn fail_find(&self, on: bool) {
        self.fail_find.store(on, Ordering::SeqCst);
    }

    fn outage() -> LeaseError {
        LeaseError::storage(std::io::Error::other("injected outage"))
    }
}

#[async_trait]
impl LeaseStore for FaultyStore {
    async fn acquire(
        &self,
        holder: &HolderId,
        duration: Duration,
    ) -> Result<Option<Lease>, LeaseError> {
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.acquire(holder, duration).await
    }

    async fn release(&self, holder: &HolderId) -> Result<bool, LeaseError> {
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.release(holder).await
    }

    async fn renew(&self, holder: &HolderId, duration: Duration) -> Result<bool, LeaseError> {
        if self.fail_renew.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.renew(holder, duration).await
    }

    async fn find_by_holder(&self, holder: &HolderId) -> Result<Option<Lease>, LeaseError> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.find_by_holder(holder).await
    }
}
