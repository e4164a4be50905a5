//! Error types for the domain model.
//!
//! Two families live here. [`DiceError`] is a hard error: a malformed dice
//! string means a rule table or save file was authored wrong. [`ModelError`]
//! covers the recoverable rejections a character can raise when a caller
//! asks for a resource it doesn't have.

use crate::SpellLevel;

/// Errors produced while parsing dice notation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiceError {
    /// The string is empty or contains no dice and no modifier.
    #[error("no dice specified")]
    NoDice,

    /// A term couldn't be parsed (e.g., `"2x6"`, `"d"`, `"3d"`).
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),

    /// A die must have between 1 and `MAX_DIE_SIDES` sides.
    #[error("invalid die size: {0}")]
    InvalidDieSize(u32),

    /// The expression rolls more than `MAX_DICE` dice in total.
    #[error("too many dice: {count} (limit {max})")]
    TooManyDice { count: u64, max: u32 },
}

/// Recoverable rejections raised by character operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    /// Cantrips are unlimited and never consume a slot.
    #[error("cantrips do not use spell slots")]
    CantripSlot,

    /// No slot of this level remains (or the class never had one).
    #[error("no level {0} spell slots remaining")]
    NoSpellSlot(SpellLevel),

    /// The inventory does not contain enough of the item.
    #[error("not enough {0} in inventory")]
    MissingItem(String),

    /// The item exists but has no healing dice attached.
    #[error("{0} cannot be used for healing")]
    NotConsumable(String),

    /// A currency change would leave a negative balance.
    #[error("insufficient {0}")]
    InsufficientFunds(crate::Denomination),

    /// The item's healing dice could not be parsed.
    #[error(transparent)]
    Dice(#[from] DiceError),
}
