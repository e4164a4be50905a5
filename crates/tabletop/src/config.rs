//! Network configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabletop_session::DEFAULT_SERVICE_TYPE;
use tabletop_transport::frame::DEFAULT_MAX_FRAME_LEN;

/// Settings for a [`NetworkManager`](crate::NetworkManager).
///
/// Override individual fields with struct update syntax:
///
/// ```rust
/// use std::time::Duration;
/// use tabletop::NetworkConfig;
///
/// let config = NetworkConfig {
///     bind: "127.0.0.1:0".into(),
///     handshake_timeout: Duration::from_secs(3),
///     ..NetworkConfig::default()
/// };
/// assert_eq!(config.lobby_name, "Tabletop Lobby");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listening address for the host role. Port 0 picks an ephemeral port.
    pub bind: String,
    /// Human-readable lobby name put in the discovery record.
    pub lobby_name: String,
    /// Discovery service type.
    pub service_type: String,
    /// How long a new connection may take to send its character.
    pub handshake_timeout: Duration,
    /// Bounded wait for background tasks during shutdown.
    pub shutdown_timeout: Duration,
    /// Largest frame accepted from a peer.
    pub max_frame_len: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:0".to_string(),
            lobby_name: "Tabletop Lobby".to_string(),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            handshake_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(1),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_ephemeral_port() {
        let config = NetworkConfig::default();
        assert!(config.bind.ends_with(":0"));
        assert_eq!(config.service_type, "_dnd._tcp.local.");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize_partial_fills_defaults() {
        let config: NetworkConfig =
            serde_json::from_str(r#"{"lobby_name": "Friday Game"}"#).unwrap();
        assert_eq!(config.lobby_name, "Friday Game");
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }
}
