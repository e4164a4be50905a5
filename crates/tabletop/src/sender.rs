//! The outbound queue and the one task that drains it.
//!
//! Every send the orchestrator makes becomes an [`Outbound`] item on one
//! unbounded queue. A single task performs the socket writes, so frames to
//! the same peer leave in the order they were queued. The queue is shared
//! by all peers: one slow peer delays everyone behind it.

use std::sync::Arc;

use tabletop_transport::{Connection, TcpConnection};
use tokio::sync::mpsc;

pub(crate) type OutboundTx = mpsc::UnboundedSender<Outbound>;

/// One unit of work for the sender task.
pub(crate) enum Outbound {
    /// Write a frame to one peer.
    Frame {
        to: Arc<TcpConnection>,
        data: Arc<[u8]>,
    },
    /// Write a final frame best-effort, then close the connection.
    Close {
        to: Arc<TcpConnection>,
        farewell: Vec<u8>,
    },
    /// Stop the sender task. Anything queued before it is still written.
    Stop,
}

/// Runs until [`Outbound::Stop`] arrives or every sender is dropped.
pub(crate) async fn run_sender(mut queue: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Frame { to, data } => {
                if let Err(e) = to.send(&data).await {
                    tracing::debug!(peer = %to.peer_addr(), error = %e, "send failed");
                }
            }
            Outbound::Close { to, farewell } => {
                let peer = to.peer_addr();
                if let Err(e) = to.send(&farewell).await {
                    tracing::debug!(%peer, error = %e, "farewell not delivered");
                }
                if let Err(e) = to.close().await {
                    tracing::debug!(%peer, error = %e, "close failed");
                }
            }
            Outbound::Stop => {
                tracing::debug!("sender task stopping");
                return;
            }
        }
    }
    tracing::debug!("outbound queue closed");
}
