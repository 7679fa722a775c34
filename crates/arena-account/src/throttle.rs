//! Concurrency limit for storage calls.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{Account, AccountError, AccountStore};

/// Default number of storage calls allowed in flight at once.
pub const DEFAULT_STORAGE_PERMITS: usize = 10;

/// Wraps an [`AccountStore`] so that at most `permits` calls run
/// against it simultaneously. Extra callers wait for a permit.
#[derive(Debug)]
pub struct Throttled<S> {
    inner: S,
    permits: Arc<Semaphore>,
}

impl<S: AccountStore> Throttled<S> {
    /// Limits `inner` to `permits` concurrent calls (at least one).
    pub fn new(inner: S, permits: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(permits.max(1))),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns how many permits are currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, AccountError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| AccountError::Storage("storage limiter closed".into()))
    }
}

impl<S: AccountStore> AccountStore for Throttled<S> {
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), AccountError> {
        let _permit = self.acquire().await?;
        self.inner.create(username, password_hash).await
    }

    async fn get(&self, username: &str) -> Result<Account, AccountError> {
        let _permit = self.acquire().await?;
        self.inner.get(username).await
    }

    async fn update_hp(&self, username: &str, hp: i32) -> Result<(), AccountError> {
        let _permit = self.acquire().await?;
        self.inner.update_hp(username, hp).await
    }
}
