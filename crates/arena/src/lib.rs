//! # Arena
//!
//! Session layer for a real-time multiplayer mage arena.
//!
//! Browser clients connect over WebSocket, register and join with a
//! username and password, and throw fireballs at each other. Each
//! connection runs its own task; arena membership lives in a shared
//! [`ArenaRegistry`] and hp is persisted through an [`AccountStore`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arena::prelude::*;
//!
//! # async fn start() -> Result<(), ArenaError> {
//! let config = ArenaConfig::from_env()?;
//! let store = Throttled::new(MemoryAccountStore::new(), config.storage_permits);
//! let server = ArenaServer::builder()
//!     .config(config)
//!     .build(store, Argon2Hasher::new())
//!     .await?;
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod handler;
mod server;
mod session;

pub use config::ArenaConfig;
pub use dispatch::{DispatchError, Dispatcher};
pub use error::ArenaError;
pub use server::{ArenaServer, ArenaServerBuilder};
pub use session::{Phase, Session};

pub use arena_account::{
    Account, AccountError, AccountId, AccountStore, Argon2Hasher, CredentialHasher,
    MemoryAccountStore, Throttled,
};
pub use arena_protocol::{ClientCommand, Codec, JsonCodec, ProtocolError, ServerEvent};
pub use arena_registry::{ArenaRegistry, Entrant, EntrantId};
pub use arena_transport::TransportError;

/// Everything needed to start a server.
pub mod prelude {
    pub use crate::{
        AccountStore, ArenaConfig, ArenaError, ArenaServer, Argon2Hasher, ClientCommand,
        CredentialHasher, MemoryAccountStore, ServerEvent, Throttled,
    };
}
