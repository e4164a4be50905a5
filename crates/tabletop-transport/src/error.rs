/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Opening an outbound connection failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The 10-byte length header wasn't an ASCII decimal number.
    #[error("invalid frame header: {0:?}")]
    InvalidHeader(String),

    /// A frame exceeded the configured maximum, or its length doesn't fit
    /// in the header.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Whether this error means the peer isn't speaking the framing
    /// protocol at all.
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, Self::InvalidHeader(_))
    }
}
