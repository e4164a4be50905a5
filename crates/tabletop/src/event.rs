//! Events delivered to the orchestrator through the inbound queue.

use std::net::SocketAddr;

use tabletop_model::Character;
use tabletop_protocol::{Envelope, MessageType};

/// Something the network layer observed.
///
/// Messages from one connection arrive in the order they were received on
/// that socket. Events from different connections may interleave freely.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Host only: a peer sent its character and is now registered.
    PlayerJoined {
        addr: SocketAddr,
        character: Character,
    },
    /// Host only: a registered peer disconnected or was kicked. Carries the
    /// host's last copy of the character.
    PlayerLeft {
        addr: SocketAddr,
        character: Character,
    },
    /// An enveloped message from a peer (a player on the host, the host on
    /// a client).
    Message { from: SocketAddr, envelope: Envelope },
    /// Client only: the connection to the host is gone.
    Disconnected { reason: String },
}

impl Inbound {
    /// The message type this event corresponds to. `None` for
    /// [`Inbound::Disconnected`], which has no wire counterpart.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Self::PlayerJoined { .. } => Some(MessageType::PlayerJoined),
            Self::PlayerLeft { .. } => Some(MessageType::PlayerLeft),
            Self::Message { envelope, .. } => Some(envelope.kind.clone()),
            Self::Disconnected { .. } => None,
        }
    }

    /// The peer the event concerns, if any.
    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            Self::PlayerJoined { addr, .. } | Self::PlayerLeft { addr, .. } => Some(*addr),
            Self::Message { from, .. } => Some(*from),
            Self::Disconnected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 4000))
    }

    #[test]
    fn test_message_type_session_events() {
        let joined = Inbound::PlayerJoined {
            addr: addr(),
            character: Character::new("Ilsa", "Elf", "Wizard"),
        };
        assert_eq!(joined.message_type(), Some(MessageType::PlayerJoined));
        assert_eq!(joined.peer(), Some(addr()));
    }

    #[test]
    fn test_message_type_forwards_envelope_kind() {
        let msg = Inbound::Message {
            from: addr(),
            envelope: Envelope::empty(MessageType::EndTurn),
        };
        assert_eq!(msg.message_type(), Some(MessageType::EndTurn));
    }

    #[test]
    fn test_message_type_disconnected_is_none() {
        let event = Inbound::Disconnected {
            reason: "closed".into(),
        };
        assert_eq!(event.message_type(), None);
        assert_eq!(event.peer(), None);
    }
}
