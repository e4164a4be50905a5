//! The host's connection table: who is connected, from where, playing whom.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is a plain `HashMap` with no locking of its own. The
//! network manager keeps it behind one mutex and only holds that lock for
//! table lookups and mutations, never across socket I/O. Methods that hand
//! connections out return cloned `Arc`s so the caller can drop the lock
//! before sending.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tabletop_model::Character;

use crate::SessionError;

/// One connected player.
#[derive(Debug)]
pub struct PlayerEntry<C> {
    pub addr: SocketAddr,
    pub connection: Arc<C>,
    /// The host's latest copy of the player's character.
    pub character: Character,
    pub joined_at: Instant,
}

impl<C> PlayerEntry<C> {
    pub fn name(&self) -> &str {
        &self.character.name
    }
}

/// Connected players keyed by remote address.
///
/// ## Lifecycle
///
/// ```text
/// first frame ──→ insert() ──→ update_character()* ──→ remove()
///                    │                                     ▲
///                    └──────── disconnect / kick ──────────┘
/// ```
#[derive(Debug)]
pub struct PlayerRegistry<C> {
    players: HashMap<SocketAddr, PlayerEntry<C>>,
}

impl<C> Default for PlayerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PlayerRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    /// Registers a player after its joining frame arrived.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if the address is taken
    /// and [`SessionError::NameTaken`] if another player has the name.
    pub fn insert(
        &mut self,
        addr: SocketAddr,
        connection: Arc<C>,
        character: Character,
    ) -> Result<&PlayerEntry<C>, SessionError> {
        if self.players.contains_key(&addr) {
            return Err(SessionError::AlreadyConnected(addr));
        }
        if self.find_by_name(&character.name).is_some() {
            return Err(SessionError::NameTaken(character.name));
        }
        tracing::info!(%addr, name = %character.name, "player registered");
        let entry = self.players.entry(addr).or_insert(PlayerEntry {
            addr,
            connection,
            character,
            joined_at: Instant::now(),
        });
        Ok(entry)
    }

    /// Removes a player. `None` if it was already gone.
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<PlayerEntry<C>> {
        let removed = self.players.remove(addr);
        if let Some(entry) = &removed {
            tracing::info!(%addr, name = %entry.name(), "player unregistered");
        }
        removed
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&PlayerEntry<C>> {
        self.players.get(addr)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.players.contains_key(addr)
    }

    /// Finds the player controlling `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&PlayerEntry<C>> {
        self.players.values().find(|e| e.name() == name)
    }

    /// Resolves a character name to its connection.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownCharacter`] if nobody plays `name`.
    pub fn connection_for(&self, name: &str) -> Result<(SocketAddr, Arc<C>), SessionError> {
        self.find_by_name(name)
            .map(|e| (e.addr, Arc::clone(&e.connection)))
            .ok_or_else(|| SessionError::UnknownCharacter(name.to_string()))
    }

    /// Replaces the stored character for a connected player.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the address isn't registered
    /// and [`SessionError::NameTaken`] if the update would rename it onto
    /// another player's character.
    pub fn update_character(
        &mut self,
        addr: &SocketAddr,
        character: Character,
    ) -> Result<(), SessionError> {
        if self
            .find_by_name(&character.name)
            .is_some_and(|other| other.addr != *addr)
        {
            return Err(SessionError::NameTaken(character.name));
        }
        let entry = self
            .players
            .get_mut(addr)
            .ok_or(SessionError::NotFound(*addr))?;
        tracing::debug!(%addr, name = %character.name, "character updated");
        entry.character = character;
        Ok(())
    }

    /// Every connection, for broadcasting.
    pub fn connections(&self) -> Vec<(SocketAddr, Arc<C>)> {
        self.players
            .values()
            .map(|e| (e.addr, Arc::clone(&e.connection)))
            .collect()
    }

    /// `(address, character name)` for every player, oldest first.
    pub fn players(&self) -> Vec<(SocketAddr, String)> {
        let mut entries: Vec<_> = self.players.values().collect();
        entries.sort_by_key(|e| e.joined_at);
        entries
            .into_iter()
            .map(|e| (e.addr, e.name().to_string()))
            .collect()
    }

    /// Every stored character, oldest first.
    pub fn characters(&self) -> Vec<Character> {
        let mut entries: Vec<_> = self.players.values().collect();
        entries.sort_by_key(|e| e.joined_at);
        entries.into_iter().map(|e| e.character.clone()).collect()
    }

    /// Empties the registry, returning what was in it.
    pub fn drain(&mut self) -> Vec<PlayerEntry<C>> {
        self.players.drain().map(|(_, e)| e).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
