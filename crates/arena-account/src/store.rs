//! The account storage seam.
//!
//! The arena never talks to a database directly. It goes through the
//! [`AccountStore`] trait, so a SQL backend, the in-memory store below,
//! or a failing mock in tests can all sit behind the same dispatcher.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::Mutex;

use crate::{Account, AccountError, AccountId, STARTING_HP};

/// Durable lookup, creation and HP update of accounts by username.
///
/// Implementations serialize conflicting writes themselves: `create`
/// enforces username uniqueness and `update_hp` is a single-row write.
///
/// # Example
///
/// ```rust
/// use arena_account::{AccountStore, MemoryAccountStore};
///
/// # tokio_test_block(async {
/// let store = MemoryAccountStore::new();
/// store.create("zed", "$argon2id$...").await.unwrap();
/// let account = store.get("zed").await.unwrap();
/// assert_eq!(account.hp, 100);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub trait AccountStore: Send + Sync + 'static {
    /// Creates an account with full HP.
    ///
    /// # Errors
    /// - [`AccountError::AlreadyExists`] if the username is taken
    /// - [`AccountError::Storage`] on any backend failure
    fn create(
        &self,
        username: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<(), AccountError>> + Send;

    /// Looks up an account by username.
    ///
    /// # Errors
    /// - [`AccountError::NotFound`] if there is no such account
    /// - [`AccountError::Storage`] on any backend failure
    fn get(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Account, AccountError>> + Send;

    /// Overwrites the account's HP.
    ///
    /// # Errors
    /// [`AccountError::Storage`] on any backend failure, including an
    /// unknown username.
    fn update_hp(
        &self,
        username: &str,
        hp: i32,
    ) -> impl Future<Output = Result<(), AccountError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryAccountStore
// ---------------------------------------------------------------------------

/// An [`AccountStore`] that keeps accounts in a process-local map.
///
/// Good for development and tests; everything is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
    next_id: AtomicI64,
}

impl MemoryAccountStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    /// Returns `true` if no accounts are stored.
    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }
}

impl AccountStore for MemoryAccountStore {
    async fn create(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), AccountError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(username) {
            return Err(AccountError::AlreadyExists(username.to_string()));
        }
        let id = AccountId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        accounts.insert(
            username.to_string(),
            Account {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                hp: STARTING_HP,
            },
        );
        tracing::debug!(%id, username, "account created");
        Ok(())
    }

    async fn get(&self, username: &str) -> Result<Account, AccountError> {
        self.accounts
            .lock()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| AccountError::NotFound(username.to_string()))
    }

    async fn update_hp(&self, username: &str, hp: i32) -> Result<(), AccountError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(username).ok_or_else(|| {
            AccountError::Storage(format!("no account row for {username}"))
        })?;
        account.hp = hp;
        Ok(())
    }
}
