//! Error types for the session layer.

use std::net::SocketAddr;

/// Errors that can occur while tracking connected players.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No player is registered under this address.
    #[error("no player connected from {0}")]
    NotFound(SocketAddr),

    /// An entry already exists for this address.
    #[error("{0} is already registered")]
    AlreadyConnected(SocketAddr),

    /// No connected player controls a character with this name.
    #[error("no connected player controls {0}")]
    UnknownCharacter(String),

    /// Another connected player already plays a character with this name.
    #[error("{0} is already at the table")]
    NameTaken(String),

    /// The peer tried to act for a character it doesn't control.
    #[error("{addr} does not control {name}")]
    NotYourCharacter { addr: SocketAddr, name: String },

    /// The discovery backend refused to register or unregister.
    #[error("discovery failed: {0}")]
    Discovery(String),
}
