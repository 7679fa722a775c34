//! Wire protocol for the arena server.
//!
//! - **Types** ([`ClientCommand`], [`ServerEvent`]): the frames that
//!   travel between browser clients and the server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong on the way.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientCommand) → Dispatch (arena state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientCommand, ServerEvent};
