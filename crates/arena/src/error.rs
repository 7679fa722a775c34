//! Unified error type for the arena server.

use arena_account::AccountError;
use arena_protocol::ProtocolError;
use arena_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An account-level error (storage, hashing).
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
