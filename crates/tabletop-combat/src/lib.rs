//! Turn-based combat for Tabletop.
//!
//! A synchronous engine the host drives one call at a time. It owns the
//! encounter roster, the battle map, the initiative order and the active
//! participant's action budget.
//!
//! # Key types
//!
//! - [`GameManager`] — initiative, turns, movement, attacks, death handling
//! - [`BattleMap`] — tiles and occupants, addressed by [`Coord`]
//! - [`CombatError`] — why an action was refused
//! - [`CombatSnapshot`] — serializable view of the encounter
//! - [`CombatConfig`] — dice used for initiative, attacks and unarmed damage

mod config;
mod error;
mod manager;
mod map;

pub use config::{ActionBudget, CombatConfig, CombatPhase};
pub use error::CombatError;
pub use manager::{
    AttackReport, AttackRequest, CombatSnapshot, Damage, DeathOutcome, GameManager,
    InitiativeEntry, MoveReport, ParticipantStatus, Position,
};
pub use map::{BattleMap, Coord, PlacedTile, Tile};
