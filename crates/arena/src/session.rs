//! Per-connection session state.
//!
//! A session is either outside the arena, inside it as exactly one
//! entrant, or finished:
//!
//! ```text
//!   Unauthenticated ──(join)──→ Active ──(join)──→ Active (new identity)
//!         ↑                       │
//!         └──(evicted by a newer  │
//!             join elsewhere)─────┤
//!                                 ▼
//!                            Terminated  (peer closed, died, shutdown)
//! ```

use arena_protocol::ServerEvent;
use arena_registry::{ArenaRegistry, EntrantId, OutboundHandle};
use arena_transport::ConnectionId;

/// Where a connection stands with respect to the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Connected, not in the arena.
    Unauthenticated,
    /// In the arena as `username`; the registry holds entrant `entrant`
    /// for this connection under that name.
    Active { username: String, entrant: EntrantId },
    /// The read loop has ended. Nothing moves out of this phase.
    Terminated,
}

impl Phase {
    /// The bound username while Active.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Active { username, .. } => Some(username),
            _ => None,
        }
    }

    /// The registered entrant while Active.
    pub fn entrant(&self) -> Option<EntrantId> {
        match self {
            Self::Active { entrant, .. } => Some(*entrant),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// One connection's view of the arena: its phase, its own outbound
/// handle and the shared registry.
///
/// Dropping an Active session (for example when its task panics) still
/// removes it from the registry; the normal path calls
/// [`terminate`](Session::terminate) instead.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    outbound: OutboundHandle,
    registry: ArenaRegistry,
}

impl Session {
    /// Creates an Unauthenticated session.
    pub fn new(outbound: OutboundHandle, registry: ArenaRegistry) -> Self {
        Self {
            phase: Phase::Unauthenticated,
            outbound,
            registry,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.outbound.connection_id()
    }

    /// This connection's own outbound handle.
    pub fn outbound(&self) -> &OutboundHandle {
        &self.outbound
    }

    /// Queues an event for this connection.
    pub fn reply(&self, event: ServerEvent) {
        self.outbound.send(event);
    }

    /// Enters Active. The caller has already added `entrant` to the
    /// registry under `username`.
    pub(crate) fn bind(&mut self, username: String, entrant: EntrantId) {
        if self.phase != Phase::Terminated {
            self.phase = Phase::Active { username, entrant };
        }
    }

    /// Handles an eviction notice. Stale notices for an earlier identity
    /// are ignored. Returns `true` if the session left Active.
    pub(crate) fn evicted(&mut self, entrant: EntrantId) -> bool {
        match &self.phase {
            Phase::Active { entrant: current, username } if *current == entrant => {
                tracing::info!(conn_id = %self.connection_id(), %username, "displaced by a newer join");
                self.phase = Phase::Unauthenticated;
                true
            }
            _ => false,
        }
    }

    /// Leaves the arena if Active: removes this connection's entrant and
    /// tells everyone else. Does nothing if the entrant is already gone
    /// (died, or displaced by a newer join).
    pub(crate) async fn leave_arena(&mut self) {
        if let Phase::Active { username, entrant } = std::mem::replace(&mut self.phase, Phase::Unauthenticated) {
            if self.registry.remove_entrant(&username, entrant).await {
                tracing::info!(conn_id = %self.connection_id(), %username, "mage left the arena");
                self.registry.broadcast_except(&username, ServerEvent::left(&username)).await;
            }
        }
    }

    /// Runs the leave cleanup and moves to Terminated. Idempotent.
    pub async fn terminate(&mut self) {
        self.leave_arena().await;
        self.phase = Phase::Terminated;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Phase::Active { username, entrant } = std::mem::replace(&mut self.phase, Phase::Terminated) else {
            return;
        };
        // Drop is synchronous, so the async cleanup runs as its own task.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let registry = self.registry.clone();
        runtime.spawn(async move {
            if registry.remove_entrant(&username, entrant).await {
                registry.broadcast_except(&username, ServerEvent::left(&username)).await;
            }
        });
    }
}
