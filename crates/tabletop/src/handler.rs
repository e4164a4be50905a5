//! Receive-side tasks: the host accept loop, one handler per player, and
//! the client's receive loop.
//!
//! A player connection on the host goes through:
//!   1. Receive the raw character frame (bounded by the handshake timeout)
//!   2. Register the connection → emit `PlayerJoined`
//!   3. Loop: receive envelopes → emit `Message`
//!   4. On close or error: deregister → emit `PlayerLeft`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tabletop_model::Character;
use tabletop_protocol::{Codec, Envelope, JsonCodec, MessageType};
use tabletop_session::PlayerRegistry;
use tabletop_transport::{Connection, TcpConnection, TcpTransport, Transport, TransportError};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;

use crate::{Inbound, NetworkError, TabletopError};

pub(crate) type InboundTx = mpsc::UnboundedSender<Inbound>;

/// State shared by the accept loop, every player handler, and the
/// manager.
///
/// The registry lock is only held for table lookups and mutations, never
/// across socket I/O.
pub(crate) struct HostContext {
    pub(crate) players: Mutex<PlayerRegistry<TcpConnection>>,
    pub(crate) inbound: InboundTx,
    pub(crate) codec: JsonCodec,
    pub(crate) handshake_timeout: Duration,
    /// Set (under the registry lock) when shutdown begins.
    pub(crate) stopping: watch::Sender<bool>,
}

impl HostContext {
    pub(crate) fn new(inbound: InboundTx, handshake_timeout: Duration) -> Self {
        Self {
            players: Mutex::new(PlayerRegistry::new()),
            inbound,
            codec: JsonCodec,
            handshake_timeout,
            stopping: watch::Sender::new(false),
        }
    }

    fn emit(&self, event: Inbound) {
        if self.inbound.send(event).is_err() {
            tracing::debug!("inbound queue closed, dropping event");
        }
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Accepts connections until the transport is shut down, then waits for
/// the player handlers it spawned.
pub(crate) async fn accept_loop(transport: Arc<TcpTransport>, ctx: Arc<HostContext>) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = transport.accept() => match accepted {
                Ok(conn) => {
                    tracing::debug!(peer = %conn.peer_addr(), "connection accepted");
                    handlers.spawn(handle_player(Arc::new(conn), Arc::clone(&ctx)));
                }
                Err(TransportError::Shutdown) => break,
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
        }
    }

    tracing::debug!(remaining = handlers.len(), "accept loop stopped");
    while handlers.join_next().await.is_some() {}
}

/// Handles one player connection from accept to close.
pub(crate) async fn handle_player(conn: Arc<TcpConnection>, ctx: Arc<HostContext>) {
    let addr = conn.peer_addr();

    let character = match receive_character(&conn, &ctx).await {
        Ok(character) => character,
        Err(e) => {
            tracing::info!(%addr, error = %e, "player rejected");
            close_quietly(&conn).await;
            return;
        }
    };

    if let Err(e) = register(&conn, &ctx, character.clone()).await {
        tracing::info!(%addr, error = %e, "player not registered");
        close_quietly(&conn).await;
        return;
    }
    tracing::info!(%addr, name = %character.name, "player joined");
    ctx.emit(Inbound::PlayerJoined { addr, character });

    match serve_player(&conn, &ctx).await {
        Ok(()) => tracing::info!(%addr, "player connection closed"),
        Err(e) => tracing::info!(%addr, error = %e, "player connection dropped"),
    }

    let removed = ctx.players.lock().await.remove(&addr);
    close_quietly(&conn).await;
    // Shutdown drains the registry first, so only organic departures are
    // reported.
    if let Some(entry) = removed {
        tracing::info!(%addr, name = %entry.name(), "player left");
        ctx.emit(Inbound::PlayerLeft {
            addr,
            character: entry.character,
        });
    }
}

/// Waits for the joining frame: a raw character, not an envelope.
async fn receive_character(
    conn: &TcpConnection,
    ctx: &HostContext,
) -> Result<Character, TabletopError> {
    let mut stopping = ctx.stopping.subscribe();

    let first = tokio::select! {
        result = tokio::time::timeout(ctx.handshake_timeout, conn.recv()) => result,
        _ = stopping.wait_for(|s| *s) => return Err(NetworkError::ShuttingDown.into()),
    };

    let data = match first {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(NetworkError::Handshake("closed before sending a character".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(NetworkError::HandshakeTimeout(ctx.handshake_timeout).into()),
    };

    let value: serde_json::Value = ctx.codec.decode(&data)?;
    if !value.is_object() {
        return Err(NetworkError::Handshake("first frame is not a character".into()).into());
    }
    Character::from_value(value)
        .map_err(|e| NetworkError::Handshake(format!("invalid character: {e}")).into())
}

/// Inserts the connection unless shutdown already started.
async fn register(
    conn: &Arc<TcpConnection>,
    ctx: &HostContext,
    character: Character,
) -> Result<(), TabletopError> {
    let mut players = ctx.players.lock().await;
    if *ctx.stopping.borrow() {
        return Err(NetworkError::ShuttingDown.into());
    }
    players.insert(conn.peer_addr(), Arc::clone(conn), character)?;
    Ok(())
}

/// Forwards enveloped messages until the connection ends.
///
/// A frame that isn't a valid envelope ends the connection. A character
/// update the registry refuses is dropped so the orchestrator never sees
/// two players under one name.
async fn serve_player(conn: &TcpConnection, ctx: &HostContext) -> Result<(), TabletopError> {
    let addr = conn.peer_addr();

    while let Some(data) = conn.recv().await? {
        let envelope: Envelope = ctx.codec.decode(&data)?;
        tracing::debug!(%addr, kind = %envelope.kind, "message received");

        if envelope.is(&MessageType::SetCharacterData) {
            match envelope.payload_as::<Character>() {
                Ok(character) => {
                    let mut players = ctx.players.lock().await;
                    if let Err(e) = players.update_character(&addr, character) {
                        tracing::info!(%addr, error = %e, "character update refused");
                        continue;
                    }
                }
                Err(e) => tracing::warn!(%addr, error = %e, "malformed character update"),
            }
        }

        ctx.emit(Inbound::Message {
            from: addr,
            envelope,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Receives from the host until the connection ends, then emits
/// [`Inbound::Disconnected`].
pub(crate) async fn client_loop(conn: Arc<TcpConnection>, inbound: InboundTx) {
    let host = conn.peer_addr();
    let codec = JsonCodec;
    let mut first = true;

    let reason = loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => break "connection closed".to_string(),
            Err(e) if first && e.is_protocol_mismatch() => {
                tracing::info!(%host, error = %e, "peer does not speak the tabletop protocol");
                break format!("not a tabletop host: {e}");
            }
            Err(e) => {
                tracing::warn!(%host, error = %e, "receive failed");
                break e.to_string();
            }
        };
        first = false;

        let envelope: Envelope = match codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(%host, error = %e, "undecodable message from host");
                break e.to_string();
            }
        };
        tracing::debug!(%host, kind = %envelope.kind, "message received");
        if inbound
            .send(Inbound::Message {
                from: host,
                envelope,
            })
            .is_err()
        {
            break "inbound queue closed".to_string();
        }
    };

    close_quietly(&conn).await;
    tracing::info!(%host, %reason, "disconnected from host");
    let _ = inbound.send(Inbound::Disconnected { reason });
}

async fn close_quietly(conn: &TcpConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(peer = %conn.peer_addr(), error = %e, "close failed");
    }
}

/// Looks up the connection for `addr` without holding the lock afterwards.
pub(crate) async fn connection_at(
    ctx: &HostContext,
    addr: SocketAddr,
) -> Result<Arc<TcpConnection>, TabletopError> {
    let players = ctx.players.lock().await;
    players
        .get(&addr)
        .map(|entry| Arc::clone(&entry.connection))
        .ok_or_else(|| tabletop_session::SessionError::NotFound(addr).into())
}
