//! Message types for Tabletop's wire format.
//!
//! Every frame after a connection's first is an [`Envelope`]:
//!
//! ```json
//! {"type": "MOVE_OBJECT", "payload": {"name": "Ilsa", "row": 2, "col": 3}}
//! ```
//!
//! The payload is kept as raw JSON. Only the orchestrator knows which
//! shape a given type carries; the typed structs in this module cover the
//! ones the engine itself consumes.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The `type` field of an envelope.
///
/// Serialized as its SCREAMING_SNAKE_CASE string. Unknown strings are kept
/// as [`MessageType::Custom`] so newer peers don't break older ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    // -- host-internal session events --
    PlayerJoined,
    PlayerLeft,

    // -- host → player --
    Kick,
    MapData,
    TriggerMessage,
    GameStateUpdate,
    Victory,
    Error,
    SaveYourCharacter,
    Log,
    GameStart,
    Ok,
    CharData,
    Summary,

    // -- either direction --
    SetCharacterData,

    // -- player → host --
    MoveObject,
    PlayerAttack,
    EndTurn,
    InteractWithObject,

    /// Anything else.
    Custom(String),
}

impl MessageType {
    /// Every known (non-custom) type.
    pub const KNOWN: [MessageType; 19] = [
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::Kick,
        Self::MapData,
        Self::TriggerMessage,
        Self::GameStateUpdate,
        Self::Victory,
        Self::Error,
        Self::SaveYourCharacter,
        Self::Log,
        Self::GameStart,
        Self::Ok,
        Self::CharData,
        Self::Summary,
        Self::SetCharacterData,
        Self::MoveObject,
        Self::PlayerAttack,
        Self::EndTurn,
        Self::InteractWithObject,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::PlayerJoined => "PLAYER_JOINED",
            Self::PlayerLeft => "PLAYER_LEFT",
            Self::Kick => "KICK",
            Self::MapData => "MAP_DATA",
            Self::TriggerMessage => "TRIGGER_MESSAGE",
            Self::GameStateUpdate => "GAME_STATE_UPDATE",
            Self::Victory => "VICTORY",
            Self::Error => "ERROR",
            Self::SaveYourCharacter => "SAVE_YOUR_CHARACTER",
            Self::Log => "LOG",
            Self::GameStart => "GAME_START",
            Self::Ok => "OK",
            Self::CharData => "CHAR_DATA",
            Self::Summary => "SUMMARY",
            Self::SetCharacterData => "SET_CHARACTER_DATA",
            Self::MoveObject => "MOVE_OBJECT",
            Self::PlayerAttack => "PLAYER_ATTACK",
            Self::EndTurn => "END_TURN",
            Self::InteractWithObject => "INTERACT_WITH_OBJECT",
            Self::Custom(s) => s,
        }
    }

    /// `true` for the two events the host raises itself rather than
    /// receiving them from a peer.
    pub fn is_session_event(&self) -> bool {
        matches!(self, Self::PlayerJoined | Self::PlayerLeft)
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        Self::KNOWN
            .iter()
            .find(|k| k.as_str() == s)
            .cloned()
            .unwrap_or(Self::Custom(s))
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for MessageType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A typed message: `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Missing payloads decode as `null`.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Builds an envelope from any serializable payload.
    pub fn new(kind: MessageType, payload: impl Serialize) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self { kind, payload })
    }

    /// An envelope with a `null` payload.
    pub fn empty(kind: MessageType) -> Self {
        Self {
            kind,
            payload: Value::Null,
        }
    }

    /// An envelope around an already-built JSON value.
    pub fn raw(kind: MessageType, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// `ERROR` with a human-readable reason.
    pub fn error(message: impl Into<String>) -> Self {
        Self::raw(
            MessageType::Error,
            serde_json::json!({ "message": message.into() }),
        )
    }

    /// Decodes the payload into a typed struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload).map_err(|source| ProtocolError::Payload {
            kind: self.kind.clone(),
            source,
        })
    }

    pub fn is(&self, kind: &MessageType) -> bool {
        &self.kind == kind
    }
}

// ---------------------------------------------------------------------------
// Payloads the engine consumes
// ---------------------------------------------------------------------------

/// `MOVE_OBJECT`: move a participant to a grid coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    pub name: String,
    pub row: i32,
    pub col: i32,
}

/// `PLAYER_ATTACK`: one attack, optionally with rolls made by the player.
///
/// `damage` is an already-rolled number; `damage_dice` is notation for the
/// host to roll. If both are absent the host uses the attacker's default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPayload {
    pub attacker: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_roll: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_dice: Option<String>,
}

/// `END_TURN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndTurnPayload {
    pub name: String,
}

/// `INTERACT_WITH_OBJECT`: the acting participant and the tile touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractPayload {
    pub name: String,
    pub row: i32,
    pub col: i32,
}

/// `ERROR`, `LOG`, `TRIGGER_MESSAGE` and `KICK` all carry a single line
/// of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub message: String,
}

impl TextPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_known_strings_round_trip() {
        for kind in MessageType::KNOWN {
            let s = String::from(kind.clone());
            assert_eq!(MessageType::from(s), kind);
        }
    }

    #[test]
    fn test_message_type_serializes_as_screaming_snake() {
        assert_eq!(
            serde_json::to_value(MessageType::GameStateUpdate).unwrap(),
            json!("GAME_STATE_UPDATE")
        );
        assert_eq!(MessageType::SetCharacterData.to_string(), "SET_CHARACTER_DATA");
    }

    #[test]
    fn test_message_type_unknown_is_custom() {
        let kind: MessageType = serde_json::from_value(json!("ROLL_DICE")).unwrap();
        assert_eq!(kind, MessageType::Custom("ROLL_DICE".into()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("ROLL_DICE"));
    }

    #[test]
    fn test_message_type_session_events() {
        assert!(MessageType::PlayerJoined.is_session_event());
        assert!(!MessageType::Kick.is_session_event());
    }

    #[test]
    fn test_envelope_json_format() {
        let env = Envelope::new(
            MessageType::MoveObject,
            MovePayload {
                name: "Ilsa".into(),
                row: 2,
                col: 3,
            },
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "MOVE_OBJECT", "payload": {"name": "Ilsa", "row": 2, "col": 3}})
        );
    }

    #[test]
    fn test_envelope_missing_payload_is_null() {
        let env: Envelope = serde_json::from_str(r#"{"type": "END_TURN"}"#).unwrap();
        assert_eq!(env.kind, MessageType::EndTurn);
        assert!(env.payload.is_null());
    }

    #[test]
    fn test_envelope_payload_as_typed() {
        let env: Envelope = serde_json::from_value(json!({
            "type": "PLAYER_ATTACK",
            "payload": {"attacker": "Ilsa", "target": "Goblin", "attack_roll": 17}
        }))
        .unwrap();
        let attack: AttackPayload = env.payload_as().unwrap();
        assert_eq!(attack.attack_roll, Some(17));
        assert_eq!(attack.damage, None);
    }

    #[test]
    fn test_envelope_payload_as_wrong_shape_names_type() {
        let env = Envelope::raw(MessageType::MoveObject, json!({"name": "Ilsa"}));
        let err = env.payload_as::<MovePayload>().unwrap_err();
        assert!(err.to_string().starts_with("bad MOVE_OBJECT payload"));
    }

    #[test]
    fn test_envelope_error_carries_message() {
        let env = Envelope::error("out of turn");
        assert_eq!(env.kind, MessageType::Error);
        let text: TextPayload = env.payload_as().unwrap();
        assert_eq!(text.message, "out of turn");
    }

    #[test]
    fn test_attack_payload_omits_absent_rolls() {
        let value = serde_json::to_value(AttackPayload {
            attacker: "Ilsa".into(),
            target: "Goblin".into(),
            ..AttackPayload::default()
        })
        .unwrap();
        assert_eq!(value, json!({"attacker": "Ilsa", "target": "Goblin"}));
    }
}
