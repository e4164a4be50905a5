//! The turn engine: initiative order, action budgets, movement, attacks,
//! and death handling.
//!
//! `GameManager` is plain synchronous state. It never blocks and has no
//! internal locking; callers that share it across tasks wrap the whole
//! engine in one mutex.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tabletop_model::{Attack, Character, Combatant, DiceExpression, DiceRoller, Enemy};

use crate::{ActionBudget, BattleMap, CombatConfig, CombatError, CombatPhase, Coord};

// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

/// One slot in the initiative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub roll: i32,
    pub name: String,
}

/// Damage supplied by the caller instead of the attacker's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Damage {
    /// Already rolled; applied as-is (negative values count as 0).
    Fixed(i32),
    /// Dice notation the engine rolls on a hit, e.g. a weapon's `"1d8+3"`.
    Dice(String),
}

/// Parameters for [`GameManager::attack`].
///
/// Leaving `attack_roll` or `damage` empty makes the engine roll them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub attacker: String,
    pub target: String,
    #[serde(default)]
    pub attack_roll: Option<i32>,
    #[serde(default)]
    pub damage: Option<Damage>,
}

impl AttackRequest {
    pub fn new(attacker: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            attacker: attacker.into(),
            target: target.into(),
            attack_roll: None,
            damage: None,
        }
    }

    pub fn with_roll(mut self, roll: i32) -> Self {
        self.attack_roll = Some(roll);
        self
    }

    pub fn with_damage(mut self, damage: Damage) -> Self {
        self.damage = Some(damage);
        self
    }
}

/// What happened to a participant that dropped to zero hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeathOutcome {
    /// Removed (or, for a character, merely down); the fight goes on.
    Defeated,
    /// No enemy is left in the initiative order. Combat is over.
    Victory,
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReport {
    pub mover: String,
    pub from: Coord,
    pub to: Coord,
    pub distance: u32,
    pub movement_left: u32,
}

/// Result of a resolved attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackReport {
    pub attacker: String,
    pub target: String,
    pub attack_roll: i32,
    pub hit: bool,
    /// Damage dealt; 0 on a miss.
    pub damage: i32,
    pub target_hp: i32,
    pub defeated: Option<DeathOutcome>,
}

/// HP line for one participant in a [`CombatSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStatus {
    pub name: String,
    pub hit_points: i32,
    pub max_hit_points: i32,
}

/// Who stands where, for a [`CombatSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    pub at: Coord,
}

/// Everything a client needs to redraw the encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub phase: CombatPhase,
    pub initiative: Vec<InitiativeEntry>,
    pub current: Option<String>,
    pub budget: ActionBudget,
    pub characters: Vec<ParticipantStatus>,
    pub enemies: Vec<ParticipantStatus>,
    pub positions: Vec<Position>,
}

// ---------------------------------------------------------------------------
// GameManager
// ---------------------------------------------------------------------------

/// The combat engine for one encounter.
pub struct GameManager {
    config: CombatConfig,
    characters: Vec<Character>,
    enemies: Vec<Enemy>,
    map: BattleMap,
    initiative: Vec<InitiativeEntry>,
    /// `None` is the idle sentinel.
    current_turn: Option<usize>,
    budget: ActionBudget,
    roller: Box<dyn DiceRoller + Send>,
}

impl std::fmt::Debug for GameManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameManager")
            .field("phase", &self.phase())
            .field("initiative", &self.initiative)
            .field("current_turn", &self.current_turn)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl GameManager {
    /// Creates an engine that rolls with an OS-seeded RNG.
    pub fn new(config: CombatConfig) -> Self {
        Self::with_roller(config, StdRng::from_os_rng())
    }

    /// Creates an engine with a caller-supplied dice source.
    pub fn with_roller(config: CombatConfig, roller: impl DiceRoller + Send + 'static) -> Self {
        Self {
            config,
            characters: Vec::new(),
            enemies: Vec::new(),
            map: BattleMap::new(),
            initiative: Vec::new(),
            current_turn: None,
            budget: ActionBudget::default(),
            roller: Box::new(roller),
        }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    // -- roster ------------------------------------------------------------

    pub fn add_character(&mut self, character: Character) {
        tracing::debug!(name = %character.name, "character added");
        self.characters.push(character);
    }

    pub fn add_enemy(&mut self, enemy: Enemy) {
        tracing::debug!(name = %enemy.name, "enemy added");
        self.enemies.push(enemy);
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }

    pub fn character_mut(&mut self, name: &str) -> Option<&mut Character> {
        self.characters.iter_mut().find(|c| c.name == name)
    }

    /// Replaces a character's stored state by name, or adds it if new.
    pub fn upsert_character(&mut self, character: Character) {
        match self.character_mut(&character.name) {
            Some(existing) => *existing = character,
            None => self.add_character(character),
        }
    }

    /// Resolves a name to a character first, then an enemy.
    pub fn combatant(&self, name: &str) -> Option<&dyn Combatant> {
        if let Some(c) = self.characters.iter().find(|c| c.name == name) {
            return Some(c);
        }
        self.enemies
            .iter()
            .find(|e| e.name == name)
            .map(|e| e as &dyn Combatant)
    }

    pub fn combatant_mut(&mut self, name: &str) -> Option<&mut dyn Combatant> {
        if let Some(c) = self.characters.iter_mut().find(|c| c.name == name) {
            return Some(c);
        }
        self.enemies
            .iter_mut()
            .find(|e| e.name == name)
            .map(|e| e as &mut dyn Combatant)
    }

    fn is_enemy(&self, name: &str) -> bool {
        self.enemies.iter().any(|e| e.name == name)
    }

    // -- map ---------------------------------------------------------------

    pub fn map(&self) -> &BattleMap {
        &self.map
    }

    pub fn set_map(&mut self, map: BattleMap) {
        self.map = map;
    }

    /// Puts a known participant on a tile, outside the movement rules.
    pub fn place(&mut self, name: &str, at: Coord) -> Result<(), CombatError> {
        if self.combatant(name).is_none() {
            return Err(CombatError::UnknownParticipant(name.to_string()));
        }
        if let Some(other) = self.map.tile(at).and_then(|t| t.occupant.as_deref()) {
            if other != name {
                return Err(CombatError::Occupied(at, other.to_string()));
            }
        }
        if !self.map.place(name, at) {
            return Err(CombatError::Unreachable(at));
        }
        Ok(())
    }

    // -- turn state --------------------------------------------------------

    pub fn phase(&self) -> CombatPhase {
        if self.current_turn.is_some() {
            CombatPhase::InProgress
        } else {
            CombatPhase::Idle
        }
    }

    pub fn initiative(&self) -> &[InitiativeEntry] {
        &self.initiative
    }

    pub fn current_turn(&self) -> Option<usize> {
        self.current_turn
    }

    pub fn budget(&self) -> ActionBudget {
        self.budget
    }

    /// Name of the participant whose turn it is.
    pub fn current_participant(&self) -> Option<&str> {
        self.current_turn
            .and_then(|i| self.initiative.get(i))
            .map(|e| e.name.as_str())
    }

    /// Rolls initiative for every character and enemy on the roster and
    /// starts the first turn.
    ///
    /// Ties keep roster order (characters before enemies) because the sort
    /// is stable.
    pub fn roll_initiative(&mut self) -> &[InitiativeEntry] {
        let die = self.config.initiative_die;
        let mut order = Vec::with_capacity(self.characters.len() + self.enemies.len());

        for c in &self.characters {
            let roll = self.roller.roll_die(die) as i32 + c.initiative_modifier();
            order.push(InitiativeEntry {
                roll,
                name: c.name.clone(),
            });
        }
        for e in &self.enemies {
            let roll = self.roller.roll_die(die) as i32 + e.initiative_modifier();
            order.push(InitiativeEntry {
                roll,
                name: e.name.clone(),
            });
        }
        order.sort_by(|a, b| b.roll.cmp(&a.roll));

        self.initiative = order;
        self.budget = ActionBudget::default();
        if self.initiative.is_empty() {
            self.current_turn = None;
        } else {
            self.current_turn = Some(0);
            tracing::info!(participants = self.initiative.len(), "initiative rolled");
            self.begin_turn();
        }
        &self.initiative
    }

    /// Resets the action budget for the current participant.
    ///
    /// Entries that no longer resolve to anyone are skipped. If none of the
    /// remaining entries resolve, the engine goes idle.
    pub fn begin_turn(&mut self) {
        let len = self.initiative.len();
        let Some(mut index) = self.current_turn else {
            return;
        };

        for _ in 0..len {
            let Some(name) = self.initiative.get(index).map(|e| e.name.as_str()) else {
                break;
            };
            let budget = self.combatant(name).map(|who| ActionBudget {
                movement_left: who.speed(),
                attacks_left: who.actions_per_turn(),
            });
            match budget {
                Some(budget) => {
                    tracing::debug!(%name, index, "turn started");
                    self.budget = budget;
                    self.current_turn = Some(index);
                    return;
                }
                None => {
                    tracing::debug!(%name, "skipping stale initiative entry");
                    index = (index + 1) % len;
                }
            }
        }

        tracing::warn!("no initiative entry resolves to a participant");
        self.current_turn = None;
        self.budget = ActionBudget::default();
    }

    /// Advances to the next participant. No-op while idle.
    pub fn end_turn(&mut self) {
        let len = self.initiative.len();
        let Some(index) = self.current_turn else {
            return;
        };
        if len == 0 {
            return;
        }
        self.current_turn = Some((index + 1) % len);
        self.begin_turn();
    }

    fn check_turn(&self, actor: &str) -> Result<(), CombatError> {
        if self.current_participant() == Some(actor) {
            Ok(())
        } else {
            Err(CombatError::OutOfTurn)
        }
    }

    // -- actions -----------------------------------------------------------

    /// Moves the current participant to `to`, spending Manhattan distance
    /// from its movement budget.
    pub fn move_to(&mut self, mover: &str, to: Coord) -> Result<MoveReport, CombatError> {
        self.check_turn(mover)?;
        let from = self
            .map
            .locate(mover)
            .ok_or_else(|| CombatError::NotOnMap(mover.to_string()))?;

        let tile = self.map.tile(to).ok_or(CombatError::Unreachable(to))?;
        if let Some(other) = tile.occupant.as_deref() {
            if other != mover {
                return Err(CombatError::Occupied(to, other.to_string()));
            }
        }

        let distance = from.manhattan(to);
        if distance > self.budget.movement_left {
            return Err(CombatError::NotEnoughMovement {
                needed: distance,
                available: self.budget.movement_left,
            });
        }

        self.map.place(mover, to);
        self.budget.movement_left -= distance;
        tracing::debug!(%mover, %from, %to, distance, "moved");

        Ok(MoveReport {
            mover: mover.to_string(),
            from,
            to,
            distance,
            movement_left: self.budget.movement_left,
        })
    }

    /// Resolves one attack by the current participant.
    ///
    /// A roll at or above the target's armor class hits. Hit points are
    /// reduced without a floor; a target at zero or below goes through
    /// [`handle_death`](Self::handle_death).
    pub fn attack(&mut self, request: AttackRequest) -> Result<AttackReport, CombatError> {
        let AttackRequest {
            attacker,
            target,
            attack_roll,
            damage,
        } = request;

        self.check_turn(&attacker)?;
        if self.budget.attacks_left == 0 {
            return Err(CombatError::NoAttacksLeft);
        }
        let attacker_default = self
            .combatant(&attacker)
            .ok_or_else(|| CombatError::UnknownParticipant(attacker.clone()))?
            .default_damage()
            .map(str::to_string);
        let armor_class = self
            .combatant(&target)
            .ok_or_else(|| CombatError::UnknownParticipant(target.clone()))?
            .armor_class();

        // Parse before spending the attack so bad dice leave state untouched.
        let damage = damage.unwrap_or_else(|| {
            Damage::Dice(attacker_default.unwrap_or_else(|| self.config.unarmed_damage.clone()))
        });
        let expression = match &damage {
            Damage::Dice(notation) => Some(DiceExpression::parse(notation)?),
            Damage::Fixed(_) => None,
        };

        let attack_roll =
            attack_roll.unwrap_or_else(|| self.roller.roll_die(self.config.attack_die) as i32);
        self.budget.attacks_left -= 1;

        let hit = attack_roll >= armor_class;
        let mut dealt = 0;
        let mut defeated = None;
        let mut target_hp = self.combatant(&target).map_or(0, |t| t.hit_points());

        if hit {
            let rolled = match (&damage, &expression) {
                (Damage::Fixed(n), _) => *n,
                (_, Some(expr)) => expr.roll(self.roller.as_mut()),
                _ => 0,
            };
            dealt = rolled.max(0);

            if let Some(t) = self.combatant_mut(&target) {
                let hp = t.hit_points() - dealt;
                t.set_hit_points(hp);
                target_hp = t.hit_points();
            }
            if target_hp <= 0 {
                defeated = Some(self.handle_death(&target));
            }
        }

        tracing::debug!(
            %attacker,
            %target,
            attack_roll,
            armor_class,
            hit,
            damage = dealt,
            target_hp,
            "attack resolved"
        );

        Ok(AttackReport {
            attacker,
            target,
            attack_roll,
            hit,
            damage: dealt,
            target_hp,
            defeated,
        })
    }

    /// Rolls a specific attack definition (to-hit bonus and damage dice) and
    /// resolves it through [`attack`](Self::attack).
    pub fn dm_attack(
        &mut self,
        attacker: &str,
        target: &str,
        attack: &Attack,
    ) -> Result<AttackReport, CombatError> {
        let expression = DiceExpression::parse(&attack.damage)?;
        let attack_roll = self.roller.roll_die(self.config.attack_die) as i32 + attack.to_hit;
        let damage = expression.roll(self.roller.as_mut());
        tracing::debug!(%attacker, attack = %attack.name, attack_roll, damage, "dm attack rolled");

        self.attack(
            AttackRequest::new(attacker, target)
                .with_roll(attack_roll)
                .with_damage(Damage::Fixed(damage)),
        )
    }

    /// Looks up an enemy's attack by name and runs it via [`dm_attack`](Self::dm_attack).
    pub fn enemy_attack(
        &mut self,
        attacker: &str,
        target: &str,
        attack_name: &str,
    ) -> Result<AttackReport, CombatError> {
        let enemy = self
            .enemies
            .iter()
            .find(|e| e.name == attacker)
            .ok_or_else(|| CombatError::UnknownParticipant(attacker.to_string()))?;
        let attack = enemy
            .attack(attack_name)
            .cloned()
            .ok_or_else(|| {
                CombatError::UnknownAttack(attacker.to_string(), attack_name.to_string())
            })?;
        self.dm_attack(attacker, target, &attack)
    }

    /// Processes a participant that dropped to zero hit points.
    ///
    /// An enemy is removed from the roster, the initiative order, and the
    /// map. If the removed entry sat at or before the current index, the
    /// index steps back by one (wrapping to the last entry) so the next
    /// [`end_turn`](Self::end_turn) lands on the participant that would
    /// have followed. This also applies when the dead enemy is the current
    /// participant. Characters stay where they are.
    pub fn handle_death(&mut self, name: &str) -> DeathOutcome {
        if !self.is_enemy(name) {
            tracing::info!(%name, "character down");
            return DeathOutcome::Defeated;
        }

        self.enemies.retain(|e| e.name != name);
        self.map.clear_occupant(name);

        if let Some(pos) = self.initiative.iter().position(|e| e.name == name) {
            self.initiative.remove(pos);
            if let Some(current) = self.current_turn {
                if pos <= current {
                    self.current_turn = match current.checked_sub(1) {
                        Some(i) => Some(i),
                        None => self.initiative.len().checked_sub(1),
                    };
                }
            }
        }

        let enemies_left = self.initiative.iter().any(|e| self.is_enemy(&e.name));
        if enemies_left {
            tracing::info!(%name, "enemy defeated");
            DeathOutcome::Defeated
        } else {
            tracing::info!(%name, "last enemy defeated, victory");
            self.current_turn = None;
            self.budget = ActionBudget::default();
            DeathOutcome::Victory
        }
    }

    /// Captures the encounter state for broadcasting.
    pub fn snapshot(&self) -> CombatSnapshot {
        CombatSnapshot {
            phase: self.phase(),
            initiative: self.initiative.clone(),
            current: self.current_participant().map(str::to_string),
            budget: self.budget,
            characters: self
                .characters
                .iter()
                .map(|c| ParticipantStatus {
                    name: c.name.clone(),
                    hit_points: c.hit_points,
                    max_hit_points: c.max_hit_points,
                })
                .collect(),
            enemies: self
                .enemies
                .iter()
                .map(|e| ParticipantStatus {
                    name: e.name.clone(),
                    hit_points: e.hit_points,
                    max_hit_points: e.max_hit_points,
                })
                .collect(),
            positions: self
                .map
                .occupants()
                .map(|(at, name)| Position {
                    name: name.to_string(),
                    at,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_model::FixedRolls;

    fn hero(name: &str, hp: i32, speed: u32) -> Character {
        let mut c = Character::new(name, "Human", "Fighter");
        c.hit_points = hp;
        c.max_hit_points = hp;
        c.armor_class = 12;
        c.speed = speed;
        c
    }

    fn engine(rolls: impl IntoIterator<Item = u32>) -> GameManager {
        GameManager::with_roller(CombatConfig::default(), FixedRolls::new(rolls))
    }

    #[test]
    fn test_roll_initiative_empty_roster_stays_idle() {
        let mut gm = engine([]);
        assert!(gm.roll_initiative().is_empty());
        assert_eq!(gm.phase(), CombatPhase::Idle);
        assert_eq!(gm.current_participant(), None);
    }

    #[test]
    fn test_roll_initiative_ties_keep_roster_order() {
        let mut gm = engine([12, 12]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        let names: Vec<_> = gm.initiative().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ilsa", "Goblin"]);
    }

    #[test]
    fn test_begin_turn_sets_budget_from_participant() {
        let mut gm = engine([20, 1]);
        gm.add_character(hero("Ilsa", 10, 25));
        gm.add_enemy(Enemy::new("Ogre", 30, 11).with_speed(40).with_actions(2));
        gm.roll_initiative();
        assert_eq!(gm.current_participant(), Some("Ilsa"));
        assert_eq!(gm.budget(), ActionBudget { movement_left: 25, attacks_left: 1 });

        gm.end_turn();
        assert_eq!(gm.current_participant(), Some("Ogre"));
        assert_eq!(gm.budget(), ActionBudget { movement_left: 40, attacks_left: 2 });
    }

    #[test]
    fn test_end_turn_wraps_around() {
        let mut gm = engine([20, 1]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        gm.end_turn();
        gm.end_turn();
        assert_eq!(gm.current_turn(), Some(0));
    }

    #[test]
    fn test_end_turn_idle_is_noop() {
        let mut gm = engine([]);
        gm.end_turn();
        assert_eq!(gm.phase(), CombatPhase::Idle);
    }

    #[test]
    fn test_begin_turn_skips_stale_entry() {
        let mut gm = engine([20, 10, 1]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.add_enemy(Enemy::new("Wolf", 11, 13));
        gm.roll_initiative();
        // Drop the goblin from the roster without going through death handling.
        gm.enemies.retain(|e| e.name != "Goblin");
        gm.end_turn();
        assert_eq!(gm.current_participant(), Some("Wolf"));
    }

    #[test]
    fn test_attack_unknown_target_rejected() {
        let mut gm = engine([20]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.roll_initiative();
        let err = gm
            .attack(AttackRequest::new("Ilsa", "Nobody").with_roll(10))
            .unwrap_err();
        assert_eq!(err, CombatError::UnknownParticipant("Nobody".into()));
        assert_eq!(gm.budget().attacks_left, 1);
    }

    #[test]
    fn test_attack_bad_dice_leaves_budget() {
        let mut gm = engine([20, 1]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        let err = gm
            .attack(
                AttackRequest::new("Ilsa", "Goblin")
                    .with_roll(18)
                    .with_damage(Damage::Dice("2x6".into())),
            )
            .unwrap_err();
        assert!(matches!(err, CombatError::Dice(_)));
        assert_eq!(gm.budget().attacks_left, 1);
    }

    #[test]
    fn test_attack_oversized_dice_rejected_without_rolling() {
        let mut gm = engine([20, 1]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        for notation in ["70000d100000", "3000000000d6", "2147483647+1"] {
            let err = gm
                .attack(
                    AttackRequest::new("Ilsa", "Goblin")
                        .with_roll(20)
                        .with_damage(Damage::Dice(notation.into())),
                )
                .unwrap_err();
            assert!(matches!(err, CombatError::Dice(_)), "{notation}");
        }
        assert_eq!(gm.budget().attacks_left, 1);
        assert_eq!(gm.enemies()[0].hit_points, 7);
    }

    #[test]
    fn test_attack_unarmed_character_uses_configured_dice() {
        // initiative 20 / 1, then the 1d4 damage roll.
        let mut gm = engine([20, 1, 3]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        let report = gm
            .attack(AttackRequest::new("Ilsa", "Goblin").with_roll(15))
            .unwrap();
        assert!(report.hit);
        assert_eq!(report.damage, 3);
        assert_eq!(report.target_hp, 4);
    }

    #[test]
    fn test_attack_negative_fixed_damage_counts_as_zero() {
        let mut gm = engine([20, 1]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        let report = gm
            .attack(
                AttackRequest::new("Ilsa", "Goblin")
                    .with_roll(19)
                    .with_damage(Damage::Fixed(-4)),
            )
            .unwrap();
        assert_eq!(report.damage, 0);
        assert_eq!(report.target_hp, 7);
    }

    #[test]
    fn test_no_attacks_left_rejected() {
        let mut gm = engine([20, 1]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        gm.attack(AttackRequest::new("Ilsa", "Goblin").with_roll(1)).unwrap();
        let err = gm
            .attack(AttackRequest::new("Ilsa", "Goblin").with_roll(20))
            .unwrap_err();
        assert_eq!(err, CombatError::NoAttacksLeft);
    }

    #[test]
    fn test_enemy_attack_uses_named_attack() {
        // Initiative: goblin 20, Ilsa 1. Then d20=10 (+4 = 14 vs AC 12) and 1d6=5 (+2).
        let mut gm = engine([1, 20, 10, 5]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(
            Enemy::new("Goblin", 7, 15).with_attack(Attack::new("Scimitar", "1d6+2", 4)),
        );
        gm.roll_initiative();
        assert_eq!(gm.current_participant(), Some("Goblin"));

        let report = gm.enemy_attack("Goblin", "Ilsa", "Scimitar").unwrap();
        assert_eq!(report.attack_roll, 14);
        assert!(report.hit);
        assert_eq!(report.damage, 7);
        assert_eq!(report.target_hp, 3);
    }

    #[test]
    fn test_enemy_attack_unknown_name_rejected() {
        let mut gm = engine([1, 20]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        let err = gm.enemy_attack("Goblin", "Ilsa", "Bite").unwrap_err();
        assert_eq!(err, CombatError::UnknownAttack("Goblin".into(), "Bite".into()));
    }

    #[test]
    fn test_character_down_is_not_removed() {
        let mut gm = engine([1, 20]);
        gm.add_character(hero("Ilsa", 4, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.roll_initiative();
        let report = gm
            .attack(
                AttackRequest::new("Goblin", "Ilsa")
                    .with_roll(20)
                    .with_damage(Damage::Fixed(9)),
            )
            .unwrap();
        assert_eq!(report.target_hp, 0);
        assert_eq!(report.defeated, Some(DeathOutcome::Defeated));
        assert_eq!(gm.initiative().len(), 2);
        assert!(gm.character("Ilsa").is_some());
    }

    #[test]
    fn test_place_rejects_unknown_and_occupied() {
        let mut gm = engine([]);
        gm.set_map(BattleMap::rectangle(3, 3));
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        assert_eq!(
            gm.place("Nobody", Coord::new(0, 0)),
            Err(CombatError::UnknownParticipant("Nobody".into()))
        );
        gm.place("Goblin", Coord::new(1, 1)).unwrap();
        assert!(matches!(
            gm.place("Ilsa", Coord::new(1, 1)),
            Err(CombatError::Occupied(_, _))
        ));
        assert_eq!(
            gm.place("Ilsa", Coord::new(9, 9)),
            Err(CombatError::Unreachable(Coord::new(9, 9)))
        );
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut gm = engine([20, 1]);
        gm.set_map(BattleMap::rectangle(2, 2));
        gm.add_character(hero("Ilsa", 10, 30));
        gm.add_enemy(Enemy::new("Goblin", 7, 15));
        gm.place("Ilsa", Coord::new(0, 0)).unwrap();
        gm.roll_initiative();

        let snap = gm.snapshot();
        assert_eq!(snap.phase, CombatPhase::InProgress);
        assert_eq!(snap.current.as_deref(), Some("Ilsa"));
        assert_eq!(snap.enemies[0].hit_points, 7);
        assert_eq!(snap.positions, vec![Position { name: "Ilsa".into(), at: Coord::new(0, 0) }]);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["phase"], "InProgress");
    }

    #[test]
    fn test_upsert_character_replaces_by_name() {
        let mut gm = engine([]);
        gm.add_character(hero("Ilsa", 10, 30));
        gm.upsert_character(hero("Ilsa", 22, 30));
        gm.upsert_character(hero("Bram", 9, 25));
        assert_eq!(gm.characters().len(), 2);
        assert_eq!(gm.character("Ilsa").unwrap().max_hit_points, 22);
    }
}
