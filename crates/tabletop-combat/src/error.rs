//! Rejections returned by the combat engine.
//!
//! These are expected outcomes, not failures: the orchestrator shows the
//! message to the acting player and lets them try again. The `Display`
//! text of each variant is the reason string sent back over the wire.

use tabletop_model::DiceError;

use crate::Coord;

/// Why the engine refused an action.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CombatError {
    /// The actor isn't the participant whose turn it is.
    #[error("out of turn")]
    OutOfTurn,

    /// The move is longer than the remaining movement budget.
    #[error("not enough movement: need {needed}, have {available}")]
    NotEnoughMovement { needed: u32, available: u32 },

    /// The attack budget for this turn is spent.
    #[error("no attacks left this turn")]
    NoAttacksLeft,

    /// No character or enemy has this name.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// The enemy has no attack with this name.
    #[error("{0} has no attack named {1}")]
    UnknownAttack(String, String),

    /// The participant has no tile on the map.
    #[error("{0} is not on the map")]
    NotOnMap(String),

    /// The destination isn't a tile on the map.
    #[error("destination {0} is unreachable")]
    Unreachable(Coord),

    /// Someone else is standing on the destination.
    #[error("destination {0} is occupied by {1}")]
    Occupied(Coord, String),

    /// Damage dice couldn't be parsed. This points at bad rule data.
    #[error(transparent)]
    Dice(#[from] DiceError),
}
