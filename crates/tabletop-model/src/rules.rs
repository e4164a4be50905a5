//! Read-only rule tables: races, classes, spells, weapons.
//!
//! The tables are loaded once at startup (usually from JSON) and handed to
//! the domain model by reference. Nothing here is global, so tests can
//! build a synthetic [`RulesData`] with exactly the entries they need.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Ability, SpellLevel, SpellSlots};

/// Hit die used when a class is missing from the table.
pub const DEFAULT_HIT_DIE: u32 = 8;

/// Walking speed used when a race is missing from the table.
pub const DEFAULT_SPEED: u32 = 30;

/// Static data for one race.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceData {
    pub speed: u32,
    pub ability_bonuses: BTreeMap<Ability, i32>,
    pub proficiencies: Vec<String>,
    pub languages: Vec<String>,
}

impl Default for RaceData {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            ability_bonuses: BTreeMap::new(),
            proficiencies: Vec::new(),
            languages: Vec::new(),
        }
    }
}

/// Static data for one class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassData {
    pub hit_die: u32,
    pub proficiencies: Vec<String>,
    pub languages: Vec<String>,
    /// Features gained at each character level.
    pub features: BTreeMap<u32, Vec<String>>,
    /// Slot table per character level. Absent levels mean non-caster.
    pub spell_slots: BTreeMap<u32, SpellSlots>,
}

impl Default for ClassData {
    fn default() -> Self {
        Self {
            hit_die: DEFAULT_HIT_DIE,
            proficiencies: Vec::new(),
            languages: Vec::new(),
            features: BTreeMap::new(),
            spell_slots: BTreeMap::new(),
        }
    }
}

/// Static data for one spell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellData {
    pub level: SpellLevel,
    pub school: String,
}

/// Static data for one weapon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponData {
    pub damage: String,
    #[serde(default)]
    pub damage_type: String,
}

/// The full set of rule tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesData {
    pub races: HashMap<String, RaceData>,
    pub classes: HashMap<String, ClassData>,
    pub spells: HashMap<String, SpellData>,
    pub weapons: HashMap<String, WeaponData>,
}

/// Errors raised while loading rule tables.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rules: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RulesData {
    /// Parses rule tables from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, RulesError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON rules file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let rules = Self::from_json_str(&text)?;
        tracing::info!(
            path = %path.as_ref().display(),
            races = rules.races.len(),
            classes = rules.classes.len(),
            spells = rules.spells.len(),
            "rules loaded"
        );
        Ok(rules)
    }

    pub fn race(&self, name: &str) -> Option<&RaceData> {
        self.races.get(name)
    }

    pub fn class(&self, name: &str) -> Option<&ClassData> {
        self.classes.get(name)
    }

    /// Hit die size for a class, falling back to [`DEFAULT_HIT_DIE`].
    pub fn hit_die(&self, class: &str) -> u32 {
        self.class(class).map_or(DEFAULT_HIT_DIE, |c| c.hit_die.max(1))
    }

    /// Canonical level of a spell, if the spell is known.
    pub fn spell_level(&self, spell: &str) -> Option<SpellLevel> {
        self.spells.get(spell).map(|s| s.level)
    }

    /// Damage dice for a weapon, if known.
    pub fn weapon_damage(&self, weapon: &str) -> Option<&str> {
        self.weapons.get(weapon).map(|w| w.damage.as_str())
    }
}
