//! The durable account record.

use std::fmt;

/// Store-assigned account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// HP a freshly registered account starts with.
pub const STARTING_HP: i32 = 100;

/// A player's durable record. Never deleted by the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    /// Unique, non-empty, already trimmed.
    pub username: String,
    /// PHC string produced by a [`CredentialHasher`](crate::CredentialHasher).
    pub password_hash: String,
    /// 0..=100 in normal play.
    pub hp: i32,
}

impl Account {
    /// Returns `true` if the account has no HP left.
    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }
}
