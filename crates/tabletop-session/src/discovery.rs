//! Lobby advertisement hook.
//!
//! Tabletop doesn't speak mDNS itself. A host describes its lobby with a
//! [`ServiceRecord`] and hands it to whatever [`Discovery`] backend the
//! application wires in: zeroconf, a matchmaking server, or nothing at
//! all ([`NoDiscovery`]). The network manager registers on start and
//! unregisters on shutdown; that is the whole contract.

use std::collections::BTreeMap;

use rand::Rng;

use crate::SessionError;

/// Default service type for local lobby discovery.
pub const DEFAULT_SERVICE_TYPE: &str = "_dnd._tcp.local.";

/// Property key carrying the human-readable lobby name.
pub const LOBBY_PROPERTY: &str = "lobby";

/// A lobby as advertised to other machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub service_type: String,
    /// `"<lobby> <suffix>"`, unique enough to tell two hosts apart.
    pub instance_name: String,
    pub port: u16,
    /// Random disambiguator appended to the instance name.
    pub suffix: u32,
    pub properties: BTreeMap<String, String>,
}

impl ServiceRecord {
    /// Builds a record for `lobby` listening on `port`, with a fresh
    /// random suffix.
    pub fn new(service_type: impl Into<String>, lobby: impl Into<String>, port: u16) -> Self {
        let suffix = rand::rng().random_range(1000..10_000);
        Self::with_suffix(service_type, lobby, port, suffix)
    }

    /// Same as [`new`](Self::new) with a caller-chosen suffix.
    pub fn with_suffix(
        service_type: impl Into<String>,
        lobby: impl Into<String>,
        port: u16,
        suffix: u32,
    ) -> Self {
        let lobby = lobby.into();
        let mut properties = BTreeMap::new();
        properties.insert(LOBBY_PROPERTY.to_string(), lobby.clone());
        Self {
            service_type: service_type.into(),
            instance_name: format!("{lobby} {suffix}"),
            port,
            suffix,
            properties,
        }
    }

    pub fn lobby(&self) -> Option<&str> {
        self.properties.get(LOBBY_PROPERTY).map(String::as_str)
    }

    /// Adds or replaces a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Publishes and withdraws lobby advertisements.
///
/// # Example
///
/// ```rust
/// use tabletop_session::{Discovery, ServiceRecord, SessionError};
///
/// /// Prints the lobby instead of announcing it.
/// struct PrintDiscovery;
///
/// impl Discovery for PrintDiscovery {
///     async fn register(&self, record: &ServiceRecord) -> Result<(), SessionError> {
///         println!("hosting {} on port {}", record.instance_name, record.port);
///         Ok(())
///     }
///
///     async fn unregister(&self, _record: &ServiceRecord) -> Result<(), SessionError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Discovery: Send + Sync + 'static {
    /// Starts advertising the lobby.
    fn register(
        &self,
        record: &ServiceRecord,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;

    /// Stops advertising the lobby.
    fn unregister(
        &self,
        record: &ServiceRecord,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// A [`Discovery`] that advertises nothing. Players connect by address.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscovery;

impl Discovery for NoDiscovery {
    async fn register(&self, record: &ServiceRecord) -> Result<(), SessionError> {
        tracing::debug!(instance = %record.instance_name, "discovery disabled, not advertising");
        Ok(())
    }

    async fn unregister(&self, _record: &ServiceRecord) -> Result<(), SessionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_record_carries_lobby_property() {
        let record = ServiceRecord::with_suffix(DEFAULT_SERVICE_TYPE, "Friday Game", 40123, 4242);
        assert_eq!(record.lobby(), Some("Friday Game"));
        assert_eq!(record.instance_name, "Friday Game 4242");
        assert_eq!(record.port, 40123);
        assert_eq!(record.service_type, "_dnd._tcp.local.");
    }

    #[test]
    fn test_service_record_new_suffix_in_range() {
        for _ in 0..50 {
            let record = ServiceRecord::new(DEFAULT_SERVICE_TYPE, "Lobby", 1);
            assert!((1000..10_000).contains(&record.suffix));
            assert!(record.instance_name.ends_with(&record.suffix.to_string()));
        }
    }

    #[test]
    fn test_service_record_with_property_adds_key() {
        let record = ServiceRecord::with_suffix(DEFAULT_SERVICE_TYPE, "Lobby", 1, 1000)
            .with_property("players", "3");
        assert_eq!(record.properties.get("players").map(String::as_str), Some("3"));
        assert_eq!(record.lobby(), Some("Lobby"));
    }

    #[tokio::test]
    async fn test_no_discovery_register_and_unregister_succeed() {
        let record = ServiceRecord::new(DEFAULT_SERVICE_TYPE, "Lobby", 1);
        NoDiscovery.register(&record).await.unwrap();
        NoDiscovery.unregister(&record).await.unwrap();
    }
}
