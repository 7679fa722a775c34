//! `ArenaServer` builder and server loop.
//!
//! This is the entry point for running an arena server. It ties together
//! all the layers: transport → protocol → dispatch → registry/accounts.

use std::future::{Future, pending};
use std::sync::Arc;

use arena_account::{AccountStore, CredentialHasher};
use arena_protocol::{Codec, JsonCodec};
use arena_registry::ArenaRegistry;
use arena_transport::{Transport, WebSocketTransport};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::handler::handle_connection;
use crate::{ArenaConfig, ArenaError, Dispatcher};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry and the store synchronize internally.
pub(crate) struct ServerState<S, H, C> {
    pub(crate) dispatcher: Dispatcher<S, H>,
    pub(crate) registry: ArenaRegistry,
    pub(crate) codec: C,
}

/// Builder for configuring and starting an arena server.
///
/// # Example
///
/// ```rust,no_run
/// use arena::prelude::*;
///
/// # async fn start() -> Result<(), ArenaError> {
/// let server = ArenaServer::builder()
///     .bind("0.0.0.0:8081")
///     .path("/ws")
///     .build(MemoryAccountStore::new(), Argon2Hasher::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArenaServerBuilder {
    config: ArenaConfig,
}

impl ArenaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the request path accepted for WebSocket upgrades.
    pub fn path(mut self, path: &str) -> Self {
        self.config.path = path.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ArenaConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and assembles the server around `store` and
    /// `hasher`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S, H>(
        self,
        store: S,
        hasher: H,
    ) -> Result<ArenaServer<S, H, JsonCodec>, ArenaError>
    where
        S: AccountStore,
        H: CredentialHasher,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr, &self.config.path).await?;

        let registry = ArenaRegistry::new();
        let state = Arc::new(ServerState {
            dispatcher: Dispatcher::new(registry.clone(), store, hasher, &self.config),
            registry,
            codec: JsonCodec,
        });

        Ok(ArenaServer { transport, state })
    }
}

/// A bound arena server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct ArenaServer<S, H, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, H, C>>,
}

impl<S, H, C> ArenaServer<S, H, C>
where
    S: AccountStore,
    H: CredentialHasher,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle on the live arena membership.
    pub fn registry(&self) -> ArenaRegistry {
        self.state.registry.clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ArenaError> {
        self.run_until(pending()).await
    }

    /// Runs the accept loop until `signal` resolves.
    ///
    /// Each accepted connection gets its own handler task. On shutdown
    /// the listener stops, every live session is told to terminate, and
    /// this returns once all of them have run their cleanup.
    pub async fn run_until(mut self, signal: impl Future<Output = ()>) -> Result<(), ArenaError> {
        tracing::info!(path = self.transport.path(), "arena server running");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut sessions = JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                () = &mut signal => break,

                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        let shutdown = shutdown_rx.clone();
                        sessions.spawn(async move {
                            if let Err(e) = handle_connection(conn, state, shutdown).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },

                // Reap finished sessions so the set does not grow.
                Some(joined) = sessions.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "session task failed");
                    }
                }
            }
        }

        tracing::info!(live = sessions.len(), "arena server shutting down");
        let _ = shutdown_tx.send(true);
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "session task failed");
            }
        }
        Ok(())
    }
}

impl ArenaServer<(), (), ()> {
    /// Creates a new builder.
    pub fn builder() -> ArenaServerBuilder {
        ArenaServerBuilder::new()
    }
}
