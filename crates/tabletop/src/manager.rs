//! `NetworkManager`: the host/client connection lifecycle.
//!
//! A manager starts [`Idle`](Role::Idle), becomes either a host or a
//! client, and returns to idle on [`shutdown`](NetworkManager::shutdown).
//! While running it owns these background tasks:
//!
//! ```text
//! host:    accept loop ──spawns──→ one handler per player ─┐
//!          sender task (drains the outbound queue)         ├──→ inbound queue
//! client:  receive loop (one connection to the host) ──────┘
//!          sender task
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabletop_model::Character;
use tabletop_protocol::{Codec, Envelope, JsonCodec, MessageType, TextPayload};
use tabletop_session::{Discovery, NoDiscovery, ServiceRecord};
use tabletop_transport::{Connection, TcpConnection, TcpTransport, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::handler::{self, HostContext};
use crate::sender::{self, Outbound, OutboundTx};
use crate::{Inbound, NetworkConfig, NetworkError, TabletopError};

/// The role a [`NetworkManager`] is currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Idle,
    /// Accepts player connections and runs the game.
    Host,
    /// Connected to exactly one host.
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Host => "host",
            Self::Client => "client",
        })
    }
}

struct HostState {
    transport: Arc<TcpTransport>,
    ctx: Arc<HostContext>,
    record: ServiceRecord,
    outbound: OutboundTx,
    sender: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

struct ClientState {
    connection: Arc<TcpConnection>,
    outbound: OutboundTx,
    sender: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

enum Mode {
    Idle,
    Host(HostState),
    Client(ClientState),
}

impl Mode {
    fn role(&self) -> Role {
        match self {
            Self::Idle => Role::Idle,
            Self::Host(_) => Role::Host,
            Self::Client(_) => Role::Client,
        }
    }
}

fn enqueue(outbound: &OutboundTx, item: Outbound) -> Result<(), NetworkError> {
    outbound.send(item).map_err(|_| NetworkError::SenderStopped)
}

/// Waits up to `limit` for `task`, aborting it if it overruns.
async fn join_or_abort(mut task: JoinHandle<()>, limit: Duration, name: &str) {
    if tokio::time::timeout(limit, &mut task).await.is_err() {
        tracing::warn!(task = name, "background task did not stop in time");
        task.abort();
    }
}

/// Owns the network side of a session in one of two roles.
///
/// Sends never block on socket I/O: they encode the envelope and queue it
/// for the sender task. Everything the network observes comes back through
/// [`recv`](Self::recv) as an [`Inbound`] event.
///
/// # Example
///
/// ```rust,no_run
/// use tabletop::prelude::*;
///
/// # async fn run() -> Result<(), TabletopError> {
/// let mut host = NetworkManager::new(NetworkConfig::default());
/// let addr = host.start_host().await?;
/// println!("lobby open on {addr}");
///
/// while let Some(event) = host.recv().await {
///     if let Inbound::PlayerJoined { character, .. } = event {
///         println!("{} joined", character.name);
///         break;
///     }
/// }
/// host.shutdown().await
/// # }
/// ```
pub struct NetworkManager<D: Discovery = NoDiscovery> {
    config: NetworkConfig,
    discovery: D,
    codec: JsonCodec,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    mode: Mode,
}

impl NetworkManager<NoDiscovery> {
    /// Creates an idle manager that doesn't advertise its lobby.
    pub fn new(config: NetworkConfig) -> Self {
        Self::with_discovery(config, NoDiscovery)
    }
}

impl<D: Discovery> NetworkManager<D> {
    /// Creates an idle manager that advertises hosted lobbies through
    /// `discovery`.
    pub fn with_discovery(config: NetworkConfig, discovery: D) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            config,
            discovery,
            codec: JsonCodec,
            inbound_tx,
            inbound_rx,
            mode: Mode::Idle,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.mode.role()
    }

    /// The listening address when hosting, the host's address when a
    /// client, `None` when idle.
    pub fn endpoint(&self) -> Option<SocketAddr> {
        match &self.mode {
            Mode::Idle => None,
            Mode::Host(host) => Some(host.transport.local_addr()),
            Mode::Client(client) => Some(client.connection.peer_addr()),
        }
    }

    /// The discovery record of the hosted lobby.
    pub fn service_record(&self) -> Option<&ServiceRecord> {
        match &self.mode {
            Mode::Host(host) => Some(&host.record),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Starts hosting: binds the listener, advertises the lobby, and begins
    /// accepting players. Returns the bound address.
    ///
    /// # Errors
    /// [`NetworkError::AlreadyRunning`] unless idle, or a transport error
    /// if the address can't be bound. A discovery failure is logged and
    /// hosting continues; players can still connect by address.
    pub async fn start_host(&mut self) -> Result<SocketAddr, TabletopError> {
        if !matches!(self.mode, Mode::Idle) {
            return Err(NetworkError::AlreadyRunning(self.role()).into());
        }

        let transport = Arc::new(
            TcpTransport::bind(&self.config.bind)
                .await?
                .with_max_frame_len(self.config.max_frame_len),
        );
        let local_addr = transport.local_addr();

        let record = ServiceRecord::new(
            self.config.service_type.clone(),
            self.config.lobby_name.clone(),
            local_addr.port(),
        );
        if let Err(e) = self.discovery.register(&record).await {
            tracing::warn!(instance = %record.instance_name, error = %e, "lobby not advertised");
        }

        let ctx = Arc::new(HostContext::new(
            self.inbound_tx.clone(),
            self.config.handshake_timeout,
        ));
        let (outbound, queue) = mpsc::unbounded_channel();
        let sender = tokio::spawn(sender::run_sender(queue));
        let tasks = vec![tokio::spawn(handler::accept_loop(
            Arc::clone(&transport),
            Arc::clone(&ctx),
        ))];

        tracing::info!(%local_addr, lobby = %self.config.lobby_name, "hosting");
        self.mode = Mode::Host(HostState {
            transport,
            ctx,
            record,
            outbound,
            sender,
            tasks,
        });
        Ok(local_addr)
    }

    /// Connects to a host and sends `character` as the joining frame.
    /// Returns the host's address.
    ///
    /// # Errors
    /// [`NetworkError::AlreadyRunning`] unless idle, or a transport error
    /// if the host can't be reached.
    pub async fn connect(
        &mut self,
        addr: &str,
        character: &Character,
    ) -> Result<SocketAddr, TabletopError> {
        if !matches!(self.mode, Mode::Idle) {
            return Err(NetworkError::AlreadyRunning(self.role()).into());
        }

        let connection = Arc::new(
            TcpConnection::connect(addr)
                .await?
                .with_max_frame_len(self.config.max_frame_len),
        );
        let host = connection.peer_addr();

        let joining = self.codec.encode(character)?;
        if let Err(e) = connection.send(&joining).await {
            let _ = connection.close().await;
            return Err(e.into());
        }

        let (outbound, queue) = mpsc::unbounded_channel();
        let sender = tokio::spawn(sender::run_sender(queue));
        let tasks = vec![tokio::spawn(handler::client_loop(
            Arc::clone(&connection),
            self.inbound_tx.clone(),
        ))];

        tracing::info!(%host, name = %character.name, "joined host");
        self.mode = Mode::Client(ClientState {
            connection,
            outbound,
            sender,
            tasks,
        });
        Ok(host)
    }

    /// Stops whichever role is running and returns to idle. A no-op when
    /// already idle.
    ///
    /// Sends queued before the call are written before any connection is
    /// closed. The sender and each background task get
    /// [`shutdown_timeout`](NetworkConfig::shutdown_timeout) to finish and
    /// are aborted after that. Undelivered inbound events are discarded.
    pub async fn shutdown(&mut self) -> Result<(), TabletopError> {
        let limit = self.config.shutdown_timeout;
        let tasks = match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Idle => {
                tracing::debug!("shutdown requested while idle");
                return Ok(());
            }
            Mode::Host(host) => {
                let _ = enqueue(&host.outbound, Outbound::Stop);
                join_or_abort(host.sender, limit, "sender").await;

                let players = {
                    let mut players = host.ctx.players.lock().await;
                    host.ctx.stopping.send_replace(true);
                    players.drain()
                };
                for entry in &players {
                    if let Err(e) = entry.connection.close().await {
                        tracing::debug!(addr = %entry.addr, error = %e, "close failed");
                    }
                }
                host.transport.shutdown().await?;

                if let Err(e) = self.discovery.unregister(&host.record).await {
                    tracing::warn!(
                        instance = %host.record.instance_name,
                        error = %e,
                        "lobby not withdrawn"
                    );
                }
                tracing::info!(players = players.len(), "host stopped");
                host.tasks
            }
            Mode::Client(client) => {
                let _ = enqueue(&client.outbound, Outbound::Stop);
                join_or_abort(client.sender, limit, "sender").await;
                if let Err(e) = client.connection.close().await {
                    tracing::debug!(error = %e, "close failed");
                }
                tracing::info!(host = %client.connection.peer_addr(), "left host");
                client.tasks
            }
        };

        for task in tasks {
            join_or_abort(task, limit, "receiver").await;
        }

        let mut dropped = 0;
        while self.inbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "discarded unprocessed inbound events");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Waits for the next network event.
    ///
    /// The manager keeps its own handle on the queue, so this only returns
    /// `None` if that is gone; while idle it simply waits.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound_rx.recv().await
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Inbound> {
        self.inbound_rx.try_recv().ok()
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn host(&self) -> Result<&HostState, NetworkError> {
        match &self.mode {
            Mode::Host(host) => Ok(host),
            other => Err(NetworkError::WrongRole {
                expected: Role::Host,
                actual: other.role(),
            }),
        }
    }

    /// Host: queues `envelope` for every connected player. Returns how
    /// many players it was queued for.
    pub async fn broadcast(&self, envelope: &Envelope) -> Result<usize, TabletopError> {
        let host = self.host()?;
        let data: Arc<[u8]> = self.codec.encode(envelope)?.into();
        let recipients = host.ctx.players.lock().await.connections();

        for (_, to) in &recipients {
            enqueue(
                &host.outbound,
                Outbound::Frame {
                    to: Arc::clone(to),
                    data: Arc::clone(&data),
                },
            )?;
        }
        tracing::debug!(kind = %envelope.kind, recipients = recipients.len(), "broadcast queued");
        Ok(recipients.len())
    }

    /// Host: queues `envelope` for the player connected from `addr`.
    pub async fn send_to(
        &self,
        addr: SocketAddr,
        envelope: &Envelope,
    ) -> Result<(), TabletopError> {
        let host = self.host()?;
        let to = handler::connection_at(&host.ctx, addr).await?;
        let data = self.codec.encode(envelope)?;
        enqueue(&host.outbound, Outbound::Frame { to, data: data.into() })?;
        Ok(())
    }

    /// Host: queues `envelope` for the player controlling `name`.
    pub async fn send_to_character(
        &self,
        name: &str,
        envelope: &Envelope,
    ) -> Result<(), TabletopError> {
        let host = self.host()?;
        let (_, to) = host.ctx.players.lock().await.connection_for(name)?;
        let data = self.codec.encode(envelope)?;
        enqueue(&host.outbound, Outbound::Frame { to, data: data.into() })?;
        Ok(())
    }

    /// Client: queues `envelope` for the host.
    pub async fn send_to_host(&self, envelope: &Envelope) -> Result<(), TabletopError> {
        let client = match &self.mode {
            Mode::Client(client) => client,
            other => {
                return Err(NetworkError::WrongRole {
                    expected: Role::Client,
                    actual: other.role(),
                }
                .into());
            }
        };
        let data = self.codec.encode(envelope)?;
        enqueue(
            &client.outbound,
            Outbound::Frame {
                to: Arc::clone(&client.connection),
                data: data.into(),
            },
        )?;
        Ok(())
    }

    /// Host: sends `KICK` to one player, then closes its connection.
    ///
    /// The player's handler notices the close and reports
    /// [`Inbound::PlayerLeft`] as for any other departure.
    pub async fn kick(&self, addr: SocketAddr, reason: &str) -> Result<(), TabletopError> {
        let host = self.host()?;
        let to = handler::connection_at(&host.ctx, addr).await?;
        let farewell = self
            .codec
            .encode(&Envelope::new(MessageType::Kick, TextPayload::new(reason))?)?;
        tracing::info!(%addr, %reason, "kicking player");
        enqueue(&host.outbound, Outbound::Close { to, farewell })?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Connection table
    // -----------------------------------------------------------------------

    /// Host: `(address, character name)` of every player, oldest first.
    /// Empty in other roles.
    pub async fn players(&self) -> Vec<(SocketAddr, String)> {
        match self.host() {
            Ok(host) => host.ctx.players.lock().await.players(),
            Err(_) => Vec::new(),
        }
    }

    /// Host: the latest copy of every player's character, oldest first.
    /// Empty in other roles.
    pub async fn characters(&self) -> Vec<Character> {
        match self.host() {
            Ok(host) => host.ctx.players.lock().await.characters(),
            Err(_) => Vec::new(),
        }
    }
}

impl<D: Discovery> Drop for NetworkManager<D> {
    fn drop(&mut self) {
        let (sender, tasks) = match &mut self.mode {
            Mode::Idle => return,
            Mode::Host(host) => (&host.sender, &mut host.tasks),
            Mode::Client(client) => (&client.sender, &mut client.tasks),
        };
        tracing::debug!("network manager dropped without shutdown");
        sender.abort();
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl<D: Discovery> fmt::Debug for NetworkManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkManager")
            .field("role", &self.role())
            .field("endpoint", &self.endpoint())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
