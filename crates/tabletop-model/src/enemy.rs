//! DM-controlled combatants.

use serde::{Deserialize, Serialize};

use crate::Combatant;

/// One attack an enemy can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    #[serde(default)]
    pub name: String,
    /// Damage dice, e.g. `"1d6+2"`.
    pub damage: String,
    #[serde(default)]
    pub to_hit: i32,
}

impl Attack {
    pub fn new(name: impl Into<String>, damage: impl Into<String>, to_hit: i32) -> Self {
        Self {
            name: name.into(),
            damage: damage.into(),
            to_hit,
        }
    }
}

/// An enemy in the current encounter.
///
/// The name identifies the enemy within a session. Hit points are allowed
/// to go negative while damage is applied; the engine removes the enemy as
/// soon as it reaches zero or below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EnemyRecord", into = "EnemyRecord")]
pub struct Enemy {
    pub name: String,
    pub hit_points: i32,
    pub max_hit_points: i32,
    pub armor_class: i32,
    pub attacks: Vec<Attack>,
    pub speed: u32,
    pub actions_per_turn: u32,
    pub initiative_modifier: i32,
}

impl Enemy {
    /// Creates an enemy with one action per turn, speed 30, no attacks.
    pub fn new(name: impl Into<String>, hit_points: i32, armor_class: i32) -> Self {
        Self {
            name: name.into(),
            hit_points,
            max_hit_points: hit_points,
            armor_class,
            attacks: Vec::new(),
            speed: crate::DEFAULT_SPEED,
            actions_per_turn: 1,
            initiative_modifier: 0,
        }
    }

    pub fn with_attack(mut self, attack: Attack) -> Self {
        self.attacks.push(attack);
        self
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_actions(mut self, actions_per_turn: u32) -> Self {
        self.actions_per_turn = actions_per_turn;
        self
    }

    pub fn with_initiative(mut self, modifier: i32) -> Self {
        self.initiative_modifier = modifier;
        self
    }

    /// Looks up an attack by name.
    pub fn attack(&self, name: &str) -> Option<&Attack> {
        self.attacks.iter().find(|a| a.name == name)
    }
}

impl Combatant for Enemy {
    fn name(&self) -> &str {
        &self.name
    }

    fn hit_points(&self) -> i32 {
        self.hit_points
    }

    /// No clamping: enemies may dip below zero before removal.
    fn set_hit_points(&mut self, hp: i32) {
        self.hit_points = hp;
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
        self.initiative_modifier
    }

    fn default_damage(&self) -> Option<&str> {
        self.attacks.first().map(|a| a.damage.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire/save representation
// ---------------------------------------------------------------------------

/// The flat on-disk shape. Accepts both `ac` and `armor_class` and always
/// writes both.
#[derive(Serialize, Deserialize)]
struct EnemyRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    hit_points: Option<i32>,
    #[serde(default)]
    max_hit_points: Option<i32>,
    #[serde(default)]
    armor_class: Option<i32>,
    #[serde(default)]
    ac: Option<i32>,
    #[serde(default)]
    attacks: Vec<Attack>,
    #[serde(default)]
    speed: Option<u32>,
    #[serde(default)]
    actions_per_turn: Option<u32>,
    #[serde(default)]
    initiative_modifier: i32,
}

impl From<EnemyRecord> for Enemy {
    fn from(r: EnemyRecord) -> Self {
        let max = r.max_hit_points.or(r.hit_points).unwrap_or(1);
        Self {
            name: r.name,
            hit_points: r.hit_points.unwrap_or(max),
            max_hit_points: max,
            armor_class: r.armor_class.or(r.ac).unwrap_or(10),
            attacks: r.attacks,
            speed: r.speed.unwrap_or(crate::DEFAULT_SPEED),
            actions_per_turn: r.actions_per_turn.unwrap_or(1),
            initiative_modifier: r.initiative_modifier,
        }
    }
}

impl From<Enemy> for EnemyRecord {
    fn from(e: Enemy) -> Self {
        Self {
            name: e.name,
            hit_points: Some(e.hit_points),
            max_hit_points: Some(e.max_hit_points),
            armor_class: Some(e.armor_class),
            ac: Some(e.armor_class),
            attacks: e.attacks,
            speed: Some(e.speed),
            actions_per_turn: Some(e.actions_per_turn),
            initiative_modifier: e.initiative_modifier,
        }
    }
}

/// Serializes an enemy list in the save-file format.
pub fn enemies_to_json(enemies: &[Enemy]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(enemies)
}

/// Parses an enemy list from the save-file format.
pub fn enemies_from_json(json: &str) -> Result<Vec<Enemy>, serde_json::Error> {
    serde_json::from_str(json)
}
