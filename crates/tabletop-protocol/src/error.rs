//! Error types for the protocol layer.
//!
//! A `ProtocolError` means the bytes arrived intact but don't form a
//! message we understand. Transport problems live in `TransportError`.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or wrong data types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope's payload doesn't have the shape its type requires.
    #[error("bad {kind} payload: {source}")]
    Payload {
        kind: crate::MessageType,
        #[source]
        source: serde_json::Error,
    },
}
