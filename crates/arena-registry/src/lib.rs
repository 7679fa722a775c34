//! Arena membership for the arena server.
//!
//! # Key types
//!
//! - [`ArenaRegistry`]: the shared table of who is in the arena
//! - [`Entrant`]: one mage's live presence, with its transient hp
//! - [`OutboundHandle`]: the addressable sink an entrant is reached by
//! - [`Delivery`]: what can be queued for a connection

mod entrant;
mod outbound;
mod registry;

pub use entrant::{Entrant, EntrantId, Hit};
pub use outbound::{Delivery, Inbox, OutboundHandle, outbound_channel};
pub use registry::ArenaRegistry;
