//! A DM host that runs one fight against a pair of goblins.
//!
//! ```text
//! skirmish [BIND] [PLAYERS] [RULES.json]
//! ```
//!
//! Waits for `PLAYERS` characters to join (default 1), rolls initiative,
//! then turns `MOVE_OBJECT`, `PLAYER_ATTACK` and `END_TURN` messages into
//! combat actions. A player may only act for the character it joined
//! with. Goblins act on their own turns. Every change is broadcast as
//! `GAME_STATE_UPDATE`; rejected actions get an `ERROR` back. An attack
//! that names no damage rolls the attacker's equipped weapon from the
//! rules file, falling back to the engine's unarmed dice.

use std::collections::HashMap;
use std::net::SocketAddr;

use tabletop::AttackReport;
use tabletop::prelude::*;
use tracing_subscriber::EnvFilter;

const START_TILES: [Coord; 4] = [
    Coord::new(0, 0),
    Coord::new(0, 1),
    Coord::new(1, 0),
    Coord::new(1, 1),
];

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Reply {
    All(Envelope),
    To(SocketAddr, Envelope),
}

fn log_line(text: impl Into<String>) -> Result<Reply, TabletopError> {
    Ok(Reply::All(Envelope::new(MessageType::Log, TextPayload::new(text))?))
}

fn describe(report: &AttackReport) -> String {
    if report.hit {
        format!(
            "{} hits {} for {} ({} HP left)",
            report.attacker, report.target, report.damage, report.target_hp
        )
    } else {
        format!("{} misses {} ({})", report.attacker, report.target, report.attack_roll)
    }
}

struct Skirmish {
    engine: GameManager,
    rules: RulesData,
    /// Which character each connected peer plays.
    seats: HashMap<SocketAddr, String>,
    expected_players: usize,
    started: bool,
    finished: bool,
}

impl Skirmish {
    fn new(mut engine: GameManager, rules: RulesData, expected_players: usize) -> Self {
        engine.set_map(BattleMap::rectangle(8, 8));
        Self {
            engine,
            rules,
            seats: HashMap::new(),
            expected_players,
            started: false,
            finished: false,
        }
    }

    fn handle(&mut self, event: Inbound) -> Result<Vec<Reply>, TabletopError> {
        match event {
            Inbound::PlayerJoined { addr, character } => self.on_join(addr, character),
            Inbound::PlayerLeft { addr, character } => {
                self.seats.remove(&addr);
                Ok(vec![log_line(format!("{} left the table", character.name))?])
            }
            Inbound::Message { from, envelope } => match self.on_message(from, &envelope) {
                Ok(replies) => Ok(replies),
                Err(e) => {
                    tracing::debug!(%from, kind = %envelope.kind, error = %e, "action rejected");
                    Ok(vec![Reply::To(from, Envelope::error(e.to_string()))])
                }
            },
            Inbound::Disconnected { .. } => Ok(Vec::new()),
        }
    }

    fn on_join(
        &mut self,
        addr: SocketAddr,
        character: Character,
    ) -> Result<Vec<Reply>, TabletopError> {
        let name = character.name.clone();
        self.seats.insert(addr, name.clone());
        self.engine.upsert_character(character);

        let free = START_TILES.iter().copied().find(|&at| {
            self.engine
                .map()
                .tile(at)
                .is_some_and(|tile| tile.occupant.is_none())
        });
        match free {
            Some(at) => self.engine.place(&name, at)?,
            None => tracing::warn!(%name, "no free start tile"),
        }

        let mut replies = vec![log_line(format!("{name} joined the table"))?];
        if !self.started && self.engine.characters().len() >= self.expected_players {
            self.start_combat(&mut replies)?;
        }
        Ok(replies)
    }

    fn start_combat(&mut self, replies: &mut Vec<Reply>) -> Result<(), TabletopError> {
        for (i, at) in [Coord::new(6, 6), Coord::new(6, 7)].into_iter().enumerate() {
            let goblin = Enemy::new(format!("Goblin {}", i + 1), 7, 15)
                .with_attack(Attack::new("Scimitar", "1d6+2", 4))
                .with_speed(6)
                .with_initiative(2);
            let name = goblin.name.clone();
            self.engine.add_enemy(goblin);
            self.engine.place(&name, at)?;
        }

        self.started = true;
        let order = self.engine.roll_initiative().to_vec();
        tracing::info!(?order, "combat started");
        replies.push(Reply::All(Envelope::new(MessageType::GameStart, &order)?));
        self.run_enemy_turns(replies)?;
        replies.push(self.state()?);
        Ok(())
    }

    /// Fails unless `from` joined as `name`.
    fn check_seat(&self, from: SocketAddr, name: &str) -> Result<(), TabletopError> {
        match self.seats.get(&from) {
            Some(seat) if seat == name => Ok(()),
            _ => Err(SessionError::NotYourCharacter {
                addr: from,
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn on_message(
        &mut self,
        from: SocketAddr,
        envelope: &Envelope,
    ) -> Result<Vec<Reply>, TabletopError> {
        let mut replies = Vec::new();
        match &envelope.kind {
            MessageType::MoveObject => {
                let step: MovePayload = envelope.payload_as()?;
                self.check_seat(from, &step.name)?;
                let report = self.engine.move_to(&step.name, Coord::new(step.row, step.col))?;
                replies.push(log_line(format!(
                    "{} moves to {} ({} movement left)",
                    report.mover, report.to, report.movement_left
                ))?);
            }
            MessageType::PlayerAttack => {
                let attack: AttackPayload = envelope.payload_as()?;
                self.check_seat(from, &attack.attacker)?;
                let damage = attack
                    .damage
                    .map(Damage::Fixed)
                    .or(attack.damage_dice.map(Damage::Dice))
                    .or_else(|| self.weapon_damage(&attack.attacker));
                let report = self.engine.attack(AttackRequest {
                    attacker: attack.attacker,
                    target: attack.target,
                    attack_roll: attack.attack_roll,
                    damage,
                })?;
                replies.push(log_line(describe(&report))?);
                if report.defeated == Some(DeathOutcome::Victory) {
                    self.finished = true;
                    replies.push(Reply::All(Envelope::new(MessageType::Victory, &report)?));
                }
            }
            MessageType::EndTurn => {
                let turn: EndTurnPayload = envelope.payload_as()?;
                self.check_seat(from, &turn.name)?;
                if self.engine.current_participant() != Some(turn.name.as_str()) {
                    return Err(CombatError::OutOfTurn.into());
                }
                self.engine.end_turn();
                self.run_enemy_turns(&mut replies)?;
            }
            MessageType::SetCharacterData => {
                let character: Character = envelope.payload_as()?;
                self.check_seat(from, &character.name)?;
                self.engine.upsert_character(character);
            }
            other => {
                tracing::debug!(kind = %other, "ignored");
                return Ok(replies);
            }
        }
        replies.push(self.state()?);
        Ok(replies)
    }

    /// Damage dice of the first equipped item the rules know as a weapon.
    fn weapon_damage(&self, name: &str) -> Option<Damage> {
        let character = self.engine.character(name)?;
        character
            .equipment
            .keys()
            .find_map(|item| self.rules.weapon_damage(item))
            .map(|dice| Damage::Dice(dice.to_string()))
    }

    /// Plays every enemy turn until a character is up or nobody is left to
    /// fight.
    fn run_enemy_turns(&mut self, replies: &mut Vec<Reply>) -> Result<(), TabletopError> {
        while !self.finished {
            let Some(current) = self.engine.current_participant().map(str::to_string) else {
                break;
            };
            let Some(enemy) = self.engine.enemies().iter().find(|e| e.name == current).cloned()
            else {
                break;
            };
            let Some(target) = self.nearest_character(&enemy) else {
                replies.push(log_line("The party has fallen")?);
                self.finished = true;
                break;
            };

            let report = match enemy.attacks.first() {
                Some(attack) => self.engine.enemy_attack(&enemy.name, &target, &attack.name)?,
                None => self.engine.attack(AttackRequest::new(&enemy.name, &target))?,
            };
            replies.push(log_line(describe(&report))?);
            self.engine.end_turn();
        }
        Ok(())
    }

    fn nearest_character(&self, enemy: &Enemy) -> Option<String> {
        let map = self.engine.map();
        let from = map.locate(&enemy.name);
        self.engine
            .characters()
            .iter()
            .filter(|c| !c.is_down())
            .min_by_key(|c| match (from, map.locate(&c.name)) {
                (Some(a), Some(b)) => a.manhattan(b),
                _ => u32::MAX,
            })
            .map(|c| c.name.clone())
    }

    fn state(&self) -> Result<Reply, TabletopError> {
        Ok(Reply::All(Envelope::new(
            MessageType::GameStateUpdate,
            self.engine.snapshot(),
        )?))
    }
}

async fn deliver(network: &NetworkManager, replies: Vec<Reply>) {
    for reply in replies {
        let result = match &reply {
            Reply::All(envelope) => network.broadcast(envelope).await.map(|_| ()),
            Reply::To(addr, envelope) => network.send_to(*addr, envelope).await,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "reply not sent");
        }
    }
}

// ---------------------------------------------------------------------------
// Host bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let bind = args.next().unwrap_or_else(|| "0.0.0.0:0".to_string());
    let players = args.next().map(|s| s.parse::<usize>()).transpose()?.unwrap_or(1);
    let rules = match args.next() {
        Some(path) => RulesData::from_json_file(path)?,
        None => RulesData::default(),
    };

    let mut network = NetworkManager::new(NetworkConfig {
        bind,
        lobby_name: "Goblin Skirmish".into(),
        ..NetworkConfig::default()
    });
    let addr = network.start_host().await?;
    tracing::info!(%addr, players, "waiting for players");

    let engine = GameManager::new(CombatConfig::default());
    let mut skirmish = Skirmish::new(engine, rules, players);
    while !skirmish.finished {
        let event = tokio::select! {
            event = network.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        };
        match skirmish.handle(event) {
            Ok(replies) => deliver(&network, replies).await,
            Err(e) => tracing::warn!(error = %e, "event not handled"),
        }
    }

    network.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop::FixedRolls;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 5000))
    }

    fn fighter(name: &str) -> Character {
        let mut character = Character::new(name, "Human", "Fighter");
        character.hit_points = 12;
        character.max_hit_points = 12;
        character.armor_class = 16;
        character.initiative = 0;
        character
    }

    fn other_peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 5001))
    }

    fn joined(name: &str) -> Inbound {
        joined_from(peer(), name)
    }

    fn joined_from(addr: SocketAddr, name: &str) -> Inbound {
        Inbound::PlayerJoined {
            addr,
            character: fighter(name),
        }
    }

    fn message_from(
        from: SocketAddr,
        kind: MessageType,
        payload: impl serde::Serialize,
    ) -> Inbound {
        Inbound::Message {
            from,
            envelope: Envelope::new(kind, payload).unwrap(),
        }
    }

    fn error_text(reply: &Reply) -> (SocketAddr, String) {
        match reply {
            Reply::To(addr, envelope) => {
                assert_eq!(envelope.kind, MessageType::Error);
                let text: TextPayload = envelope.payload_as().unwrap();
                (*addr, text.message)
            }
            other => panic!("expected a targeted reply, got {other:?}"),
        }
    }

    fn message(kind: MessageType, payload: impl serde::Serialize) -> Inbound {
        message_from(peer(), kind, payload)
    }

    fn kinds(replies: &[Reply]) -> Vec<MessageType> {
        replies
            .iter()
            .map(|r| match r {
                Reply::All(e) | Reply::To(_, e) => e.kind.clone(),
            })
            .collect()
    }

    /// Initiative: Ilsa 20, goblins 1+2 and 1+2.
    fn started() -> Skirmish {
        let engine = GameManager::with_roller(CombatConfig::default(), FixedRolls::new([20, 1, 1]));
        let mut skirmish = Skirmish::new(engine, RulesData::default(), 1);
        let replies = skirmish.handle(joined("Ilsa")).unwrap();
        assert!(kinds(&replies).contains(&MessageType::GameStart));
        skirmish
    }

    #[test]
    fn test_join_places_character_on_start_tile() {
        let engine = GameManager::new(CombatConfig::default());
        let mut skirmish = Skirmish::new(engine, RulesData::default(), 2);
        let replies = skirmish.handle(joined("Ilsa")).unwrap();
        assert_eq!(kinds(&replies), [MessageType::Log]);
        assert_eq!(skirmish.engine.map().locate("Ilsa"), Some(Coord::new(0, 0)));
        assert!(!skirmish.started);
    }

    #[test]
    fn test_last_join_starts_combat_with_character_first() {
        let skirmish = started();
        assert_eq!(skirmish.engine.current_participant(), Some("Ilsa"));
        assert_eq!(skirmish.engine.enemies().len(), 2);
    }

    /// Ilsa (from `peer`) 20, Bram (from `other_peer`) 15, goblins 3 and 3.
    fn started_pair() -> Skirmish {
        let rolls = FixedRolls::new([20, 15, 1, 1]);
        let engine = GameManager::with_roller(CombatConfig::default(), rolls);
        let mut skirmish = Skirmish::new(engine, RulesData::default(), 2);
        skirmish.handle(joined_from(peer(), "Ilsa")).unwrap();
        skirmish.handle(joined_from(other_peer(), "Bram")).unwrap();
        assert!(skirmish.started);
        skirmish
    }

    #[test]
    fn test_move_for_goblin_replies_error_to_sender() {
        let mut skirmish = started();
        let replies = skirmish
            .handle(message(
                MessageType::MoveObject,
                MovePayload {
                    name: "Goblin 1".into(),
                    row: 5,
                    col: 5,
                },
            ))
            .unwrap();
        assert_eq!(replies.len(), 1);
        let (addr, text) = error_text(&replies[0]);
        assert_eq!(addr, peer());
        assert_eq!(text, format!("{} does not control Goblin 1", peer()));
        assert_eq!(skirmish.engine.map().locate("Goblin 1"), Some(Coord::new(6, 6)));
    }

    #[test]
    fn test_player_cannot_act_for_another_players_character() {
        let mut skirmish = started_pair();
        assert_eq!(skirmish.engine.current_participant(), Some("Ilsa"));

        let moves = skirmish
            .handle(message_from(
                other_peer(),
                MessageType::MoveObject,
                MovePayload {
                    name: "Ilsa".into(),
                    row: 3,
                    col: 3,
                },
            ))
            .unwrap();
        let attacks = skirmish
            .handle(message_from(
                other_peer(),
                MessageType::PlayerAttack,
                AttackPayload {
                    attacker: "Ilsa".into(),
                    target: "Goblin 1".into(),
                    attack_roll: Some(20),
                    damage: Some(10),
                    damage_dice: None,
                },
            ))
            .unwrap();
        let ends = skirmish
            .handle(message_from(
                other_peer(),
                MessageType::EndTurn,
                EndTurnPayload { name: "Ilsa".into() },
            ))
            .unwrap();

        for replies in [&moves, &attacks, &ends] {
            assert_eq!(replies.len(), 1);
            let (addr, text) = error_text(&replies[0]);
            assert_eq!(addr, other_peer());
            assert!(text.contains("does not control Ilsa"), "{text}");
        }
        assert_eq!(skirmish.engine.map().locate("Ilsa"), Some(Coord::new(0, 0)));
        assert_eq!(skirmish.engine.enemies().len(), 2);
        assert_eq!(skirmish.engine.budget().attacks_left, 1);
        assert_eq!(skirmish.engine.current_participant(), Some("Ilsa"));
    }

    #[test]
    fn test_set_character_data_for_another_player_is_rejected() {
        let mut skirmish = started_pair();
        let mut forged = fighter("Ilsa");
        forged.hit_points = 1;

        let replies = skirmish
            .handle(message_from(other_peer(), MessageType::SetCharacterData, &forged))
            .unwrap();
        let (addr, _) = error_text(&replies[0]);
        assert_eq!(addr, other_peer());
        assert_eq!(skirmish.engine.character("Ilsa").unwrap().hit_points, 12);

        let mut own = fighter("Bram");
        own.hit_points = 5;
        let replies = skirmish
            .handle(message_from(other_peer(), MessageType::SetCharacterData, &own))
            .unwrap();
        assert_eq!(kinds(&replies), [MessageType::GameStateUpdate]);
        assert_eq!(skirmish.engine.character("Bram").unwrap().hit_points, 5);
    }

    #[test]
    fn test_departed_peer_loses_its_seat() {
        let mut skirmish = started();
        skirmish
            .handle(Inbound::PlayerLeft {
                addr: peer(),
                character: fighter("Ilsa"),
            })
            .unwrap();
        let replies = skirmish
            .handle(message(
                MessageType::EndTurn,
                EndTurnPayload { name: "Ilsa".into() },
            ))
            .unwrap();
        assert_eq!(kinds(&replies), [MessageType::Error]);
    }

    #[test]
    fn test_move_broadcasts_state() {
        let mut skirmish = started();
        let replies = skirmish
            .handle(message(
                MessageType::MoveObject,
                MovePayload {
                    name: "Ilsa".into(),
                    row: 2,
                    col: 2,
                },
            ))
            .unwrap();
        assert_eq!(kinds(&replies), [MessageType::Log, MessageType::GameStateUpdate]);
        assert_eq!(skirmish.engine.map().locate("Ilsa"), Some(Coord::new(2, 2)));
    }

    #[test]
    fn test_killing_both_goblins_broadcasts_victory() {
        let mut skirmish = started();
        skirmish.engine.character_mut("Ilsa").unwrap().actions_per_turn = 2;
        skirmish.engine.begin_turn();

        for goblin in ["Goblin 1", "Goblin 2"] {
            skirmish
                .handle(message(
                    MessageType::PlayerAttack,
                    AttackPayload {
                        attacker: "Ilsa".into(),
                        target: goblin.into(),
                        attack_roll: Some(18),
                        damage: Some(10),
                        damage_dice: None,
                    },
                ))
                .unwrap();
        }
        assert!(skirmish.finished);
        assert!(skirmish.engine.enemies().is_empty());
    }

    #[test]
    fn test_attack_without_damage_rolls_equipped_weapon() {
        let rules = RulesData::from_json_str(r#"{"weapons": {"Longsword": {"damage": "1d8"}}}"#)
            .unwrap();
        // Initiative 20 / 1 / 1, then the longsword's damage die.
        let engine =
            GameManager::with_roller(CombatConfig::default(), FixedRolls::new([20, 1, 1, 7]));
        let mut skirmish = Skirmish::new(engine, rules, 1);
        let mut ilsa = fighter("Ilsa");
        ilsa.equipment.insert("Shield".into(), 2);
        ilsa.equipment.insert("Longsword".into(), 0);
        skirmish
            .handle(Inbound::PlayerJoined {
                addr: peer(),
                character: ilsa,
            })
            .unwrap();

        skirmish
            .handle(message(
                MessageType::PlayerAttack,
                AttackPayload {
                    attacker: "Ilsa".into(),
                    target: "Goblin 1".into(),
                    attack_roll: Some(18),
                    damage: None,
                    damage_dice: None,
                },
            ))
            .unwrap();
        // 1d4 unarmed would have clamped the 7 to 4 and left the goblin up.
        assert!(skirmish.engine.enemies().iter().all(|e| e.name != "Goblin 1"));
    }

    #[test]
    fn test_end_turn_runs_goblin_turns() {
        let mut skirmish = started();
        let replies = skirmish
            .handle(message(
                MessageType::EndTurn,
                EndTurnPayload { name: "Ilsa".into() },
            ))
            .unwrap();
        // One log line per goblin attack, then the new state.
        assert_eq!(
            kinds(&replies),
            [MessageType::Log, MessageType::Log, MessageType::GameStateUpdate]
        );
        assert_eq!(skirmish.engine.current_participant(), Some("Ilsa"));
    }

    #[test]
    fn test_end_turn_by_wrong_player_is_rejected() {
        let mut skirmish = started();
        let replies = skirmish
            .handle(message(
                MessageType::EndTurn,
                EndTurnPayload {
                    name: "Goblin 2".into(),
                },
            ))
            .unwrap();
        assert_eq!(kinds(&replies), [MessageType::Error]);
        assert_eq!(skirmish.engine.current_participant(), Some("Ilsa"));
    }
}
