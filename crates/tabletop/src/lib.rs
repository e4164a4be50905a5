//! # Tabletop
//!
//! Networking and combat orchestration for a tabletop RPG session.
//!
//! One machine hosts (the DM) and runs the [`GameManager`]; every player
//! connects to it as a client. This crate owns the connection lifecycle
//! ([`NetworkManager`]) and re-exports the layers below it:
//!
//! ```text
//! orchestrator ──→ NetworkManager ──→ session ──→ protocol ──→ transport
//!      │
//!      └─────────→ GameManager (combat) ──→ model
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tabletop::prelude::*;
//!
//! # async fn run() -> Result<(), TabletopError> {
//! let mut player = NetworkManager::new(NetworkConfig::default());
//! let hero = Character::new("Ilsa", "Elf", "Wizard");
//! player.connect("192.168.1.20:40123", &hero).await?;
//!
//! let end_turn = Envelope::new(MessageType::EndTurn, EndTurnPayload { name: hero.name.clone() })?;
//! player.send_to_host(&end_turn).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod event;
mod handler;
mod manager;
mod sender;

pub use config::NetworkConfig;
pub use error::{NetworkError, TabletopError};
pub use event::Inbound;
pub use manager::{NetworkManager, Role};

pub use tabletop_combat::{
    AttackReport, AttackRequest, BattleMap, CombatConfig, CombatError, CombatPhase,
    CombatSnapshot, Coord, Damage, DeathOutcome, GameManager, MoveReport,
};
pub use tabletop_model::{Attack, Character, Combatant, DiceRoller, Enemy, FixedRolls, RulesData};
pub use tabletop_protocol::{
    AttackPayload, Codec, EndTurnPayload, Envelope, InteractPayload, JsonCodec, MessageType,
    MovePayload, ProtocolError, TextPayload,
};
pub use tabletop_session::{Discovery, NoDiscovery, ServiceRecord, SessionError};
pub use tabletop_transport::TransportError;

/// Everything an orchestrator usually needs.
pub mod prelude {
    pub use crate::{
        Attack, AttackPayload, AttackRequest, BattleMap, Character, CombatConfig, CombatError,
        CombatSnapshot, Combatant, Coord, Damage, DeathOutcome, Discovery, EndTurnPayload, Enemy,
        Envelope, GameManager, Inbound, MessageType, MovePayload, NetworkConfig, NetworkError,
        NetworkManager, NoDiscovery, Role, RulesData, ServiceRecord, SessionError,
        TabletopError, TextPayload,
    };
}
