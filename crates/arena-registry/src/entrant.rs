//! A player's live presence in the arena.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arena_account::AccountId;
use tokio::sync::Mutex;

use crate::OutboundHandle;

/// Counter for generating unique entrant IDs.
static NEXT_ENTRANT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one entry into the arena. A rejoin under the same username
/// gets a new id, so stale removals can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntrantId(u64);

impl EntrantId {
    fn next() -> Self {
        Self(NEXT_ENTRANT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

#[derive(Debug)]
struct Vitals {
    hp: i32,
    alive: bool,
}

/// Outcome of [`Entrant::strike`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    /// Damage was applied and persisted. `lethal` is `true` for exactly
    /// one hit per entrant: the one that brought hp to zero.
    Landed { hp: i32, lethal: bool },
    /// The entrant was already dead; nothing changed.
    Missed,
}

/// A mage currently in the arena.
///
/// Clones share the same vitals, so the copy returned by a registry
/// snapshot sees damage applied through any other copy.
#[derive(Debug, Clone)]
pub struct Entrant {
    id: EntrantId,
    account_id: AccountId,
    username: String,
    vitals: Arc<Mutex<Vitals>>,
    outbound: OutboundHandle,
}

impl Entrant {
    /// Creates a live entrant with `hp` taken from the account.
    pub fn new(
        account_id: AccountId,
        username: impl Into<String>,
        hp: i32,
        outbound: OutboundHandle,
    ) -> Self {
        Self {
            id: EntrantId::next(),
            account_id,
            username: username.into(),
            vitals: Arc::new(Mutex::new(Vitals { hp, alive: true })),
            outbound,
        }
    }

    pub fn id(&self) -> EntrantId {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The sink for this entrant's connection.
    pub fn outbound(&self) -> &OutboundHandle {
        &self.outbound
    }

    /// Current transient hp.
    pub async fn hp(&self) -> i32 {
        self.vitals.lock().await.hp
    }

    /// `false` once a lethal hit has landed.
    pub async fn is_alive(&self) -> bool {
        self.vitals.lock().await.alive
    }

    /// Applies `damage` and persists the result through `persist`.
    ///
    /// Hits on the same entrant are serialized: the vitals lock is held
    /// until `persist` finishes, so concurrent hits never lose an update.
    /// If `persist` fails the in-memory hp is left untouched and its
    /// error is returned. Hp never goes below zero.
    pub async fn strike<F, Fut, E>(&self, damage: i32, persist: F) -> Result<Hit, E>
    where
        F: FnOnce(i32) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut vitals = self.vitals.lock().await;
        if !vitals.alive {
            return Ok(Hit::Missed);
        }

        let hp = (vitals.hp - damage).max(0);
        persist(hp).await?;

        vitals.hp = hp;
        let lethal = hp <= 0;
        if lethal {
            vitals.alive = false;
        }
        Ok(Hit::Landed { hp, lethal })
    }

    /// Takes this entrant out of combat and returns its final hp.
    ///
    /// Waits for any strike in flight, so the returned hp matches what
    /// was last persisted. Every later strike is [`Hit::Missed`].
    /// Idempotent.
    pub async fn retire(&self) -> i32 {
        let mut vitals = self.vitals.lock().await;
        vitals.alive = false;
        vitals.hp
    }
}
