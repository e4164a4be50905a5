//! Player characters: derived stats, resting, leveling, and persistence.
//!
//! A [`Character`] stores both the choices a player made (race, class,
//! base scores, spells, gear) and the stats derived from them. The derived
//! half is rebuilt by [`Character::initialize`], which must run again after
//! any race, class, or level change.
//!
//! # Lifecycle
//!
//! ```text
//! new(name, race, class) ──→ initialize(rules) ──→ play
//!                                  ↑                 │
//!                                  └── level_up ─────┘
//! ```
//!
//! Defeated characters are never destroyed; only their hit points change.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::spells::{deserialize_buckets, deserialize_slots, find_spell};
use crate::{
    Ability, AbilityScores, Combatant, Currency, DiceExpression, DiceRoller, Denomination, Item,
    ModelError, RulesData, SpellBuckets, SpellLevel, SpellSlots, DEFAULT_SPEED,
};

/// Sentinel a UI sends when the player declined to swap a spell.
pub const NO_SPELL: &str = "none";

/// A player-controlled character.
///
/// Field names double as the save-file and wire keys. Every field has a
/// default, so older or partial documents still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub race: String,
    pub class: String,
    pub level: u32,

    /// Scores as rolled/bought, before racial bonuses.
    pub base_abilities: AbilityScores,
    /// `base_abilities` plus racial bonuses. Rebuilt by `initialize`.
    pub abilities: AbilityScores,

    pub hit_points: i32,
    pub max_hit_points: i32,
    /// Max HP gained at each level past 1, in order. Survives `initialize`.
    pub hit_point_gains: Vec<i32>,
    pub hit_die: u32,
    pub hit_dice: u32,
    pub max_hit_dice: u32,

    pub speed: u32,
    pub armor_class: i32,
    pub initiative: i32,
    pub actions_per_turn: u32,

    #[serde(deserialize_with = "deserialize_slots")]
    pub max_spell_slots: SpellSlots,
    #[serde(deserialize_with = "deserialize_slots")]
    pub spell_slots: SpellSlots,
    #[serde(deserialize_with = "deserialize_buckets")]
    pub spells: SpellBuckets,

    pub inventory: Vec<Item>,
    /// Equipped item name → armor class bonus.
    pub equipment: BTreeMap<String, i32>,
    pub currency: Currency,

    pub proficiencies: BTreeSet<String>,
    pub languages: BTreeSet<String>,
    pub features: Vec<String>,

    pub background: String,
    pub alignment: String,
    pub personality_traits: String,
    pub ideals: String,
    pub bonds: String,
    pub flaws: String,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            name: String::new(),
            race: String::new(),
            class: String::new(),
            level: 1,
            base_abilities: AbilityScores::default(),
            abilities: AbilityScores::default(),
            hit_points: 0,
            max_hit_points: 0,
            hit_point_gains: Vec::new(),
            hit_die: crate::DEFAULT_HIT_DIE,
            hit_dice: 1,
            max_hit_dice: 1,
            speed: DEFAULT_SPEED,
            armor_class: 10,
            initiative: 0,
            actions_per_turn: 1,
            max_spell_slots: SpellSlots::new(),
            spell_slots: SpellSlots::new(),
            spells: SpellBuckets::new(),
            inventory: Vec::new(),
            equipment: BTreeMap::new(),
            currency: Currency::default(),
            proficiencies: BTreeSet::new(),
            languages: BTreeSet::new(),
            features: Vec::new(),
            background: String::new(),
            alignment: String::new(),
            personality_traits: String::new(),
            ideals: String::new(),
            bonds: String::new(),
            flaws: String::new(),
        }
    }
}

/// Choices made on the level-up screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelUpChoices {
    /// Added to the base scores.
    pub ability_increases: BTreeMap<Ability, i32>,
    pub new_cantrips: Vec<String>,
    /// Filed under each spell's canonical level.
    pub new_spells: Vec<String>,
    /// `(old, new)`; ignored unless both are real spell names.
    pub swap: Option<(String, String)>,
}

/// What a level-up changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpReport {
    pub new_level: u32,
    pub hit_points_gained: i32,
}

impl Character {
    /// Creates a level-1 character. Call [`initialize`](Self::initialize)
    /// before use.
    pub fn new(
        name: impl Into<String>,
        race: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            race: race.into(),
            class: class.into(),
            ..Self::default()
        }
    }

    /// Modifier for one derived ability.
    pub fn modifier(&self, ability: Ability) -> i32 {
        self.abilities.modifier(ability)
    }

    // -----------------------------------------------------------------------
    // Derived stats
    // -----------------------------------------------------------------------

    /// Rebuilds every race/class/level dependent field, in a fixed order.
    ///
    /// Unknown races or classes fall back to empty tables (speed 30, hit
    /// die 8) and are logged, so a save file referencing homebrew content
    /// still loads.
    pub fn initialize(&mut self, rules: &RulesData) {
        let race = rules.race(&self.race);
        let class = rules.class(&self.class);
        if race.is_none() {
            tracing::warn!(name = %self.name, race = %self.race, "unknown race, using defaults");
        }
        if class.is_none() {
            tracing::warn!(name = %self.name, class = %self.class, "unknown class, using defaults");
        }
        self.level = self.level.max(1);

        // 1. abilities and speed
        self.abilities = self.base_abilities;
        if let Some(race) = race {
            for (ability, bonus) in &race.ability_bonuses {
                *self.abilities.get_mut(*ability) += bonus;
            }
        }
        self.speed = race.map_or(DEFAULT_SPEED, |r| r.speed);

        // 2. proficiencies and languages
        self.proficiencies = race
            .into_iter()
            .flat_map(|r| r.proficiencies.iter())
            .chain(class.into_iter().flat_map(|c| c.proficiencies.iter()))
            .cloned()
            .collect();
        self.languages = race
            .into_iter()
            .flat_map(|r| r.languages.iter())
            .chain(class.into_iter().flat_map(|c| c.languages.iter()))
            .cloned()
            .collect();

        // 3. hit points (level 1 baseline plus recorded level-up gains)
        self.hit_die = rules.hit_die(&self.class);
        let con = self.modifier(Ability::Constitution);
        self.max_hit_points =
            self.hit_die as i32 + con + self.hit_point_gains.iter().sum::<i32>();
        self.hit_points = self.max_hit_points;

        // 4. hit dice
        self.max_hit_dice = self.level;
        self.hit_dice = self.level;

        // 5. features
        self.features = class
            .map(|c| {
                (1..=self.level)
                    .filter_map(|lvl| c.features.get(&lvl))
                    .flatten()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // 6. spell slots
        self.max_spell_slots = class
            .and_then(|c| c.spell_slots.get(&self.level))
            .cloned()
            .unwrap_or_default();
        self.max_spell_slots.remove(&SpellLevel::CANTRIP);
        self.spell_slots = self.max_spell_slots.clone();

        // 7. initiative, 8. armor class
        self.initiative = self.modifier(Ability::Dexterity);
        self.recompute_armor_class();

        tracing::debug!(
            name = %self.name,
            level = self.level,
            hp = self.max_hit_points,
            ac = self.armor_class,
            "character initialized"
        );
    }

    /// `10 + dex modifier + equipment bonuses`.
    pub fn recompute_armor_class(&mut self) {
        self.armor_class =
            10 + self.modifier(Ability::Dexterity) + self.equipment.values().sum::<i32>();
    }

    // -----------------------------------------------------------------------
    // Resting
    // -----------------------------------------------------------------------

    /// Full HP, full spell slots, and `max(1, max_hit_dice / 2)` hit dice back.
    pub fn long_rest(&mut self) {
        self.hit_points = self.max_hit_points;
        self.spell_slots = self.max_spell_slots.clone();
        let recovered = (self.max_hit_dice / 2).max(1);
        self.hit_dice = (self.hit_dice + recovered).min(self.max_hit_dice);
        tracing::debug!(name = %self.name, hit_dice = self.hit_dice, "long rest");
    }

    /// Spends up to `dice` hit dice and returns the total the dice healed
    /// (before the max-HP cap is applied).
    ///
    /// Each die heals `1d<hit_die> + con`, floored at 0. With no hit dice
    /// available this is a no-op that returns 0.
    pub fn short_rest(&mut self, dice: u32, roller: &mut dyn DiceRoller) -> i32 {
        let spent = dice.min(self.hit_dice);
        if spent == 0 {
            return 0;
        }
        let con = self.modifier(Ability::Constitution);
        let rolled: i32 = (0..spent)
            .map(|_| (roller.roll_die(self.hit_die) as i32 + con).max(0))
            .sum();

        self.hit_points = (self.hit_points + rolled).min(self.max_hit_points);
        self.hit_dice -= spent;
        tracing::debug!(name = %self.name, spent, healed = rolled, "short rest");
        rolled
    }

    // -----------------------------------------------------------------------
    // Leveling
    // -----------------------------------------------------------------------

    /// Advances one level, applies `choices`, and re-derives stats.
    pub fn level_up(
        &mut self,
        choices: &LevelUpChoices,
        rules: &RulesData,
        roller: &mut dyn DiceRoller,
    ) -> LevelUpReport {
        self.level += 1;

        let hit_die = rules.hit_die(&self.class);
        let con = self.modifier(Ability::Constitution);
        let gained = (roller.roll_die(hit_die) as i32 + con).max(1);
        self.hit_point_gains.push(gained);
        self.max_hit_points += gained;
        self.hit_points = self.max_hit_points;
        self.max_hit_dice = self.level;
        self.hit_dice = self.level;

        for (ability, increase) in &choices.ability_increases {
            *self.base_abilities.get_mut(*ability) += increase;
        }

        if !choices.new_cantrips.is_empty() {
            self.spells
                .entry(SpellLevel::CANTRIP)
                .or_default()
                .extend(choices.new_cantrips.iter().cloned());
        }

        for spell in &choices.new_spells {
            match rules.spell_level(spell).filter(|l| !l.is_cantrip()) {
                Some(level) => {
                    self.spells.entry(level).or_default().insert(spell.clone());
                }
                None => tracing::debug!(%spell, "skipping spell with no known level"),
            }
        }

        if let Some((old, new)) = &choices.swap {
            self.swap_spell(old, new, rules);
        }

        self.initialize(rules);
        tracing::info!(name = %self.name, level = self.level, gained, "level up");

        LevelUpReport {
            new_level: self.level,
            hit_points_gained: gained,
        }
    }

    /// Replaces `old` with `new`. Does nothing unless `old` is known.
    fn swap_spell(&mut self, old: &str, new: &str, rules: &RulesData) {
        let is_real = |s: &str| !s.trim().is_empty() && !s.eq_ignore_ascii_case(NO_SPELL);
        if !is_real(old) || !is_real(new) {
            return;
        }
        let Some(from) = find_spell(&self.spells, old) else {
            return;
        };
        if let Some(bucket) = self.spells.get_mut(&from) {
            bucket.remove(old);
            if bucket.is_empty() {
                self.spells.remove(&from);
            }
        }
        let to = rules.spell_level(new).unwrap_or(from);
        self.spells.entry(to).or_default().insert(new.to_string());
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// Consumes one slot of `level` and returns how many remain.
    pub fn expend_spell_slot(&mut self, level: SpellLevel) -> Result<u32, ModelError> {
        if level.is_cantrip() {
            return Err(ModelError::CantripSlot);
        }
        match self.spell_slots.get_mut(&level) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Ok(*n)
            }
            _ => Err(ModelError::NoSpellSlot(level)),
        }
    }

    /// Applies damage, clamping at 0. Returns the new HP.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        self.hit_points = (self.hit_points - amount.max(0)).max(0);
        self.hit_points
    }

    /// Heals, clamping at max. Returns the HP actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hit_points;
        self.hit_points = (self.hit_points + amount.max(0)).min(self.max_hit_points);
        self.hit_points - before
    }

    /// Equips an item and recomputes armor class.
    pub fn equip(&mut self, item: impl Into<String>, ac_bonus: i32) {
        self.equipment.insert(item.into(), ac_bonus);
        self.recompute_armor_class();
    }

    /// Unequips an item. Returns `false` if it wasn't equipped.
    pub fn unequip(&mut self, item: &str) -> bool {
        let removed = self.equipment.remove(item).is_some();
        if removed {
            self.recompute_armor_class();
        }
        removed
    }

    /// Adds to the inventory, merging quantities by name.
    pub fn add_item(&mut self, item: Item) {
        match self.inventory.iter_mut().find(|i| i.name == item.name) {
            Some(existing) => {
                existing.quantity += item.quantity;
                if existing.healing.is_none() {
                    existing.healing = item.healing;
                }
            }
            None => self.inventory.push(item),
        }
    }

    /// Removes `quantity` of an item, dropping the line when it hits zero.
    pub fn remove_item(&mut self, name: &str, quantity: u32) -> Result<(), ModelError> {
        let pos = self
            .inventory
            .iter()
            .position(|i| i.name == name && i.quantity >= quantity)
            .ok_or_else(|| ModelError::MissingItem(name.to_string()))?;
        self.inventory[pos].quantity -= quantity;
        if self.inventory[pos].quantity == 0 {
            self.inventory.remove(pos);
        }
        Ok(())
    }

    /// Drinks/uses one healing item and returns the HP restored.
    pub fn use_healing_item(
        &mut self,
        name: &str,
        roller: &mut dyn DiceRoller,
    ) -> Result<i32, ModelError> {
        let item = self
            .inventory
            .iter()
            .find(|i| i.name == name && i.quantity > 0)
            .ok_or_else(|| ModelError::MissingItem(name.to_string()))?;
        let dice = item
            .healing
            .as_deref()
            .ok_or_else(|| ModelError::NotConsumable(name.to_string()))?;
        let amount = DiceExpression::parse(dice)?.roll(roller);
        self.remove_item(name, 1)?;
        Ok(self.heal(amount))
    }

    /// Adds or spends coins.
    pub fn adjust_currency(
        &mut self,
        denomination: Denomination,
        delta: i64,
    ) -> Result<i64, ModelError> {
        self.currency
            .adjust(denomination, delta)
            .ok_or(ModelError::InsufficientFunds(denomination))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serializes to the flat save/wire structure.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Builds a character from the flat structure, defaulting missing keys.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Combatant for Character {
    fn name(&self) -> &str {
        &self.name
    }

    fn hit_points(&self) -> i32 {
        self.hit_points
    }

    /// Characters keep HP inside `[0, max]`.
    fn set_hit_points(&mut self, hp: i32) {
        self.hit_points = hp.clamp(0, self.max_hit_points.max(0));
    }

    fn armor_class(&self) -> i32 {
        self.armor_class
    }

    fn speed(&self) -> u32 {
        self.speed
    }

    fn actions_per_turn(&self) -> u32 {
        self.actions_per_turn
    }

    fn initiative_modifier(&self) -> i32 {
        self.initiative
    }
}
