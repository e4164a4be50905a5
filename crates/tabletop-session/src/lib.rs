//! Connected-player tracking for Tabletop.
//!
//! This crate handles the host's view of who is in the game:
//!
//! 1. **Registry** ([`PlayerRegistry`]) — the connection table, keyed by
//!    remote address, holding each player's latest character
//! 2. **Discovery** ([`Discovery`] trait, [`ServiceRecord`]) — how a lobby
//!    is advertised to players on the network
//!
//! # How it fits in the stack
//!
//! ```text
//! NetworkManager (above)  ← locks the registry around lookups and updates
//!     ↕
//! Session Layer (this crate)  ← player identity and lobby advertisement
//!     ↕
//! Model Layer (below)  ← provides Character
//! ```

mod discovery;
mod error;
mod registry;

pub use discovery::{DEFAULT_SERVICE_TYPE, Discovery, LOBBY_PROPERTY, NoDiscovery, ServiceRecord};
pub use error::SessionError;
pub use registry::{PlayerEntry, PlayerRegistry};
