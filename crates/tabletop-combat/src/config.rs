//! Combat configuration and the engine's phase state machine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CombatConfig
// ---------------------------------------------------------------------------

/// Tunables for the combat engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Damage dice for an attacker with no configured attack.
    pub unarmed_damage: String,

    /// Die rolled for initiative.
    pub initiative_die: u32,

    /// Die rolled for attacks when the caller doesn't supply a roll.
    pub attack_die: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            unarmed_damage: "1d4".to_string(),
            initiative_die: 20,
            attack_die: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// CombatPhase
// ---------------------------------------------------------------------------

/// Where the engine is in an encounter.
///
/// ```text
/// Idle ──(roll_initiative, non-empty)──→ InProgress ──(victory)──→ Idle
/// ```
///
/// - **Idle**: no initiative order, no active turn.
/// - **InProgress**: one participant's turn is live and its action budget
///   is being spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatPhase {
    Idle,
    InProgress,
}

impl CombatPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for CombatPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::InProgress => write!(f, "InProgress"),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionBudget
// ---------------------------------------------------------------------------

/// What the active participant has left this turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBudget {
    pub movement_left: u32,
    pub attacks_left: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combat_config_default() {
        let config = CombatConfig::default();
        assert_eq!(config.unarmed_damage, "1d4");
        assert_eq!(config.initiative_die, 20);
        assert_eq!(config.attack_die, 20);
    }

    #[test]
    fn test_combat_config_partial_json_uses_defaults() {
        let config: CombatConfig =
            serde_json::from_str(r#"{"unarmed_damage": "1d2"}"#).unwrap();
        assert_eq!(config.unarmed_damage, "1d2");
        assert_eq!(config.attack_die, 20);
    }

    #[test]
    fn test_combat_phase_is_active() {
        assert!(!CombatPhase::Idle.is_active());
        assert!(CombatPhase::InProgress.is_active());
    }

    #[test]
    fn test_combat_phase_display() {
        assert_eq!(CombatPhase::Idle.to_string(), "Idle");
        assert_eq!(CombatPhase::InProgress.to_string(), "InProgress");
    }
}
