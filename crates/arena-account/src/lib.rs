//! The account gateway for the arena server.
//!
//! Accounts are the durable side of a player: username, password hash
//! and HP. The arena reads and writes them through two seams:
//!
//! 1. [`AccountStore`]: lookup, creation and HP updates
//! 2. [`CredentialHasher`]: password hashing and verification
//!
//! ```text
//! Dispatcher (above)  ← registers, authenticates, persists damage
//!     ↕
//! Account layer (this crate)  ← AccountStore + CredentialHasher
//!     ↕
//! Database / memory (below)
//! ```

#![allow(async_fn_in_trait)]

mod account;
mod error;
mod hasher;
mod store;
mod throttle;

pub use account::{Account, AccountId, STARTING_HP};
pub use error::AccountError;
pub use hasher::{Argon2Hasher, CredentialHasher};
pub use store::{AccountStore, MemoryAccountStore};
pub use throttle::{DEFAULT_STORAGE_PERMITS, Throttled};
