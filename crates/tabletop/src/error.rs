//! Unified error type for the Tabletop crates.

use std::time::Duration;

use tabletop_combat::CombatError;
use tabletop_model::{DiceError, ModelError};
use tabletop_protocol::ProtocolError;
use tabletop_session::SessionError;
use tabletop_transport::TransportError;

use crate::Role;

/// Errors raised by [`NetworkManager`](crate::NetworkManager) itself.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// `start_host`/`connect` called while a role is already active.
    #[error("network manager is already running as {0}")]
    AlreadyRunning(Role),

    /// The operation is only valid in another role.
    #[error("operation requires the {expected} role, manager is {actual}")]
    WrongRole { expected: Role, actual: Role },

    /// The outbound queue is gone, so nothing can be sent.
    #[error("sender task has stopped")]
    SenderStopped,

    /// The joining peer didn't send its character in time.
    #[error("no character received within {0:?}")]
    HandshakeTimeout(Duration),

    /// The joining peer went away or sent something that isn't a character.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The host began shutting down while the peer was joining.
    #[error("host is shutting down")]
    ShuttingDown,
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TabletopError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A rejected combat action ("out of turn", "not enough movement", ...).
    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Dice(#[from] DiceError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
