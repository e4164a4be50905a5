//! Domain model for Tabletop.
//!
//! This crate is the leaf of the workspace. It owns everything that
//! describes a participant and nothing that describes a session:
//!
//! - **Dice** ([`DiceExpression`], [`DiceRoller`]) — parse and roll
//!   notation like `"2d6+1"`.
//! - **Rules** ([`RulesData`]) — read-only race/class/spell/weapon tables,
//!   injected by the caller.
//! - **Characters** ([`Character`]) — derived stats, resting, leveling,
//!   and the flat save/wire format.
//! - **Enemies** ([`Enemy`]) — DM-controlled combatants.
//! - **[`Combatant`]** — the small interface the combat engine uses so it
//!   never has to ask which of the two it's holding.
//!
//! ```text
//! Combat (above)  ← drives characters/enemies through Combatant
//!     ↕
//! Model (this crate)  ← stats, rules, dice
//! ```

mod ability;
mod character;
mod combatant;
mod dice;
mod enemy;
mod error;
mod inventory;
mod rules;
mod spells;

pub use ability::{modifier, Ability, AbilityScores};
pub use character::{Character, LevelUpChoices, LevelUpReport, NO_SPELL};
pub use combatant::Combatant;
pub use dice::{
    roll_notation, DiceExpression, DiceRoller, DiceTerm, FixedRolls, MAX_DICE, MAX_DIE_SIDES,
};
pub use enemy::{enemies_from_json, enemies_to_json, Attack, Enemy};
pub use error::{DiceError, ModelError};
pub use inventory::{Currency, Denomination, Item};
pub use rules::{
    ClassData, RaceData, RulesData, RulesError, SpellData, WeaponData, DEFAULT_HIT_DIE,
    DEFAULT_SPEED,
};
pub use spells::{
    find_spell, normalize_slots, normalize_spells, SpellBuckets, SpellLevel, SpellSlots,
};
