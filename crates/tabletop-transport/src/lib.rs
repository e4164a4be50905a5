//! Transport abstraction layer for Tabletop.
//!
//! Provides the [`Transport`] and [`Connection`] traits and a TCP
//! implementation that moves length-prefixed frames (see [`frame`]).
//!
//! # Feature Flags
//!
//! - `tcp` (default) — TCP transport via `tokio::net`

#![allow(async_fn_in_trait)]

mod error;
pub mod frame;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpTransport};

use std::net::SocketAddr;

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    ///
    /// Returns an error once [`shutdown`](Self::shutdown) has been called.
    async fn accept(&self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting connections and wakes any pending `accept`.
    async fn shutdown(&self) -> Result<(), Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> SocketAddr;
}

/// A single connection that can send and receive whole frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed, either by
    /// the peer or by a local [`close`](Self::close).
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection in both directions.
    async fn close(&self) -> Result<(), Self::Error>;

    /// The remote address, which also identifies the connection.
    fn peer_addr(&self) -> SocketAddr;
}
