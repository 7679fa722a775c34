//! The arena registry: who is in the arena right now.
//!
//! Every operation takes one short exclusive lock over the map and
//! returns owned data. List operations hand back a snapshot copy, and
//! broadcasts queue onto each recipient's [`OutboundHandle`] only after
//! the lock is released, so no network write ever happens while the map
//! is held.
//!
//! [`OutboundHandle`]: crate::OutboundHandle

use std::collections::HashMap;
use std::sync::Arc;

use arena_protocol::ServerEvent;
use tokio::sync::Mutex;

use crate::{Entrant, EntrantId};

/// Concurrency-safe table of entrants keyed by username.
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ArenaRegistry {
    entrants: Arc<Mutex<HashMap<String, Entrant>>>,
}

impl ArenaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entrant`, replacing any entrant already registered under
    /// the same username. The displaced entrant is returned so the
    /// caller can notify it.
    pub async fn add(&self, entrant: Entrant) -> Option<Entrant> {
        let username = entrant.username().to_string();
        let id = entrant.id();
        let displaced = self.entrants.lock().await.insert(username.clone(), entrant);
        tracing::debug!(%username, entrant = %id, replaced = displaced.is_some(), "entrant added");
        displaced
    }

    /// Removes whatever entrant is registered under `username` and
    /// retires it. Absent usernames are a no-op.
    pub async fn remove(&self, username: &str) -> Option<Entrant> {
        let removed = self.entrants.lock().await.remove(username)?;
        removed.retire().await;
        Some(removed)
    }

    /// Removes the entrant under `username` only if it is entrant `id`.
    ///
    /// The entrant is retired before it leaves the map, so once it is
    /// gone no strike against it is still in flight and its hp has been
    /// persisted. Returns `true` if this call removed it. Across
    /// concurrent callers at most one gets `true` for a given entrant,
    /// which is what makes the `left`/`died` broadcasts happen once.
    pub async fn remove_entrant(&self, username: &str, id: EntrantId) -> bool {
        let Some(current) = self.lookup(username).await.filter(|e| e.id() == id) else {
            return false;
        };
        // The vitals lock can be held across a storage call; never wait
        // for it while holding the map.
        current.retire().await;

        let mut entrants = self.entrants.lock().await;
        match entrants.get(username) {
            Some(current) if current.id() == id => {
                entrants.remove(username);
                true
            }
            _ => false,
        }
    }

    /// Looks up the entrant registered under `username`.
    pub async fn lookup(&self, username: &str) -> Option<Entrant> {
        self.entrants.lock().await.get(username).cloned()
    }

    /// Returns `true` if `username` is in the arena.
    pub async fn contains(&self, username: &str) -> bool {
        self.entrants.lock().await.contains_key(username)
    }

    /// Snapshot of every entrant whose username differs from `username`.
    pub async fn list_except(&self, username: &str) -> Vec<Entrant> {
        self.entrants
            .lock()
            .await
            .values()
            .filter(|e| e.username() != username)
            .cloned()
            .collect()
    }

    /// Snapshot of every entrant.
    pub async fn list_all(&self) -> Vec<Entrant> {
        self.entrants.lock().await.values().cloned().collect()
    }

    /// Usernames of every entrant except `username`.
    pub async fn usernames_except(&self, username: &str) -> Vec<String> {
        self.entrants
            .lock()
            .await
            .keys()
            .filter(|name| name.as_str() != username)
            .cloned()
            .collect()
    }

    /// Usernames of every entrant.
    pub async fn usernames(&self) -> Vec<String> {
        self.entrants.lock().await.keys().cloned().collect()
    }

    /// Queues `event` for every entrant except `username` and returns
    /// the recipients' usernames.
    pub async fn broadcast_except(&self, username: &str, event: ServerEvent) -> Vec<String> {
        let recipients = self.list_except(username).await;
        recipients
            .into_iter()
            .map(|entrant| {
                entrant.outbound().send(event.clone());
                entrant.username().to_string()
            })
            .collect()
    }

    /// Number of entrants.
    pub async fn len(&self) -> usize {
        self.entrants.lock().await.len()
    }

    /// Returns `true` if nobody is in the arena.
    pub async fn is_empty(&self) -> bool {
        self.entrants.lock().await.is_empty()
    }
}
