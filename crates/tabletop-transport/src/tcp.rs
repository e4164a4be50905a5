//! TCP transport with length-prefixed frames.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};

use crate::frame::{self, DEFAULT_MAX_FRAME_LEN, HEADER_LEN};
use crate::{Connection, Transport, TransportError};

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    max_frame_len: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    ///
    /// Use port 0 for an ephemeral port and read it back with
    /// [`local_addr`](Transport::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "TCP transport listening");
        Ok(Self {
            listener,
            local_addr,
            shutdown: watch::Sender::new(false),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// Sets the frame size limit for accepted connections.
    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&self) -> Result<Self::Connection, Self::Error> {
        let mut stop = self.shutdown.subscribe();
        if *stop.borrow() {
            return Err(TransportError::Shutdown);
        }

        tokio::select! {
            accepted = self.listener.accept() => {
                let (stream, peer) = accepted.map_err(TransportError::AcceptFailed)?;
                tracing::debug!(%peer, "accepted TCP connection");
                TcpConnection::from_stream(stream, peer, self.max_frame_len)
            }
            _ = stop.wait_for(|stopped| *stopped) => Err(TransportError::Shutdown),
        }
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.shutdown.send_replace(true);
        tracing::debug!(local_addr = %self.local_addr, "TCP transport stopped accepting");
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// A single framed TCP connection.
///
/// Reads and writes go through separate halves so a task blocked in
/// [`recv`](Connection::recv) never holds up a sender.
pub struct TcpConnection {
    peer: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
    max_frame_len: usize,
}

impl TcpConnection {
    /// Opens an outbound connection.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::ConnectFailed {
                addr: addr.to_string(),
                source,
            })?;
        let peer = stream
            .peer_addr()
            .map_err(|source| TransportError::ConnectFailed {
                addr: addr.to_string(),
                source,
            })?;
        tracing::debug!(%peer, "connected");
        Self::from_stream(stream, peer, DEFAULT_MAX_FRAME_LEN)
    }

    fn from_stream(
        stream: TcpStream,
        peer: SocketAddr,
        max_frame_len: usize,
    ) -> Result<Self, TransportError> {
        stream.set_nodelay(true).map_err(TransportError::AcceptFailed)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: watch::Sender::new(false),
            max_frame_len,
        })
    }

    /// Sets the frame size limit for this connection.
    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Reads one frame. `Ok(None)` if the peer closed between frames.
    async fn read_frame(
        &self,
        reader: &mut OwnedReadHalf,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = reader
                .read(&mut header[filled..])
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TransportError::ConnectionClosed(format!(
                    "eof after {filled} header bytes"
                )));
            }
            filled += n;
        }

        let len = frame::decode_header(&header)?;
        if len > self.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::ConnectionClosed(format!("eof inside {len}-byte frame"))
            } else {
                TransportError::ReceiveFailed(e)
            }
        })?;
        tracing::trace!(peer = %self.peer, len, "frame received");
        Ok(Some(payload))
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(self.peer.to_string()));
        }
        let header = frame::encode_header(data.len())?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&header)
            .await
            .map_err(TransportError::SendFailed)?;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)?;
        tracing::trace!(peer = %self.peer, len = data.len(), "frame sent");
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stop = self.closed.subscribe();
        if *stop.borrow() {
            return Ok(None);
        }
        let mut reader = self.reader.lock().await;

        tokio::select! {
            result = self.read_frame(&mut reader) => result,
            _ = stop.wait_for(|closed| *closed) => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        tracing::debug!(peer = %self.peer, "closing connection");
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            // Already reset by the peer.
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e)),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
