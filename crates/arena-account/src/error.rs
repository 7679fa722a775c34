//! Error types for the account layer.

/// Errors reported by an [`AccountStore`](crate::AccountStore) or a
/// [`CredentialHasher`](crate::CredentialHasher).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// An account with this username already exists.
    #[error("mage {0} already exists")]
    AlreadyExists(String),

    /// No account with this username.
    #[error("mage {0} not found")]
    NotFound(String),

    /// The backing store failed; the message comes from the store.
    #[error("{0}")]
    Storage(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}
