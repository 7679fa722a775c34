//! Per-connection handler: greeting, command routing and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Queue the `mages` roster for the new connection
//!   2. Loop: deliver queued events, decode and dispatch inbound frames
//!   3. On exit (peer gone, death, decode failure, shutdown) terminate
//!      the session exactly once
//!
//! This task is the only writer on its socket. Everything addressed to
//! the connection, including its own replies, goes through its outbound
//! queue.

use std::sync::Arc;

use arena_account::{AccountStore, CredentialHasher};
use arena_protocol::{ClientCommand, Codec, ServerEvent};
use arena_registry::{Delivery, outbound_channel};
use arena_transport::{Connection, WebSocketConnection};
use tokio::sync::watch;

use crate::server::ServerState;
use crate::{ArenaError, Session};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, H, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, H, C>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ArenaError>
where
    S: AccountStore,
    H: CredentialHasher,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbound, mut inbox) = outbound_channel(conn_id);
    let mut session = Session::new(outbound, state.registry.clone());

    session.reply(ServerEvent::Mages {
        mages: state.registry.usernames().await,
    });

    let result = loop {
        tokio::select! {
            biased;

            Ok(()) = shutdown.changed() => {
                tracing::debug!(%conn_id, "server shutting down");
                break Ok(());
            }

            Some(delivery) = inbox.recv() => match delivery {
                Delivery::Event(event) => {
                    if let Err(e) = send_event(&conn, &state.codec, &event).await {
                        break Err(e);
                    }
                }
                Delivery::Evicted(entrant) => {
                    session.evicted(entrant);
                }
                Delivery::Close => {
                    tracing::debug!(%conn_id, "closing connection on request");
                    break Ok(());
                }
            },

            received = conn.recv() => match received {
                Ok(Some(data)) => {
                    let command: ClientCommand = match state.codec.decode(&data) {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            tracing::debug!(%conn_id, error = %e, "undecodable frame");
                            break Err(e.into());
                        }
                    };
                    tracing::trace!(%conn_id, kind = command.kind(), "command received");
                    if let Err(e) = state.dispatcher.dispatch(&mut session, command).await {
                        tracing::debug!(%conn_id, error = %e, "command refused");
                        session.reply(ServerEvent::error(e.to_string()));
                    }
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break Ok(());
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break Err(e.into());
                }
            },
        }
    };

    session.terminate().await;

    // Flush whatever was queued before the close, e.g. the death notice.
    while let Ok(Delivery::Event(event)) = inbox.try_recv() {
        if send_event(&conn, &state.codec, &event).await.is_err() {
            break;
        }
    }
    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after session end");
    }

    result
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), ArenaError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}
