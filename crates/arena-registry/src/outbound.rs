//! Outbound delivery to a single connection.
//!
//! The registry never holds a connection. It holds an [`OutboundHandle`],
//! the sending half of the connection's delivery queue; the connection's
//! own task drains the queue and is the only writer to its socket. A
//! slow peer therefore only ever slows down its own task.

use arena_protocol::ServerEvent;
use arena_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::EntrantId;

/// Something queued for a connection's task to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Write this event to the client.
    Event(ServerEvent),
    /// The entrant with this id was displaced by a newer join under the
    /// same username; the session is no longer in the arena as it.
    Evicted(EntrantId),
    /// Close the connection once everything queued before this is sent.
    Close,
}

/// Receiving half of a connection's delivery queue.
pub type Inbox = mpsc::UnboundedReceiver<Delivery>;

/// Cloneable, addressable sink for one connection.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    connection: ConnectionId,
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Creates the delivery queue for a connection.
pub fn outbound_channel(connection: ConnectionId) -> (OutboundHandle, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundHandle { connection, tx }, rx)
}

impl OutboundHandle {
    /// The connection this handle delivers to.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    /// Queues an event. Returns `false` if the connection is gone,
    /// which callers treat as a silent drop.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(Delivery::Event(event)).is_ok()
    }

    /// Tells the connection that `entrant` was displaced.
    pub fn evict(&self, entrant: EntrantId) -> bool {
        self.tx.send(Delivery::Evicted(entrant)).is_ok()
    }

    /// Asks the connection to close after draining what is queued.
    pub fn close(&self) -> bool {
        self.tx.send(Delivery::Close).is_ok()
    }

    /// Returns `true` once the connection's task has dropped its inbox.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
