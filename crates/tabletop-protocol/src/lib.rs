//! Wire protocol for Tabletop.
//!
//! This crate defines what travels inside a frame:
//!
//! - **Types** ([`Envelope`], [`MessageType`], typed payloads) — the
//!   `{"type", "payload"}` messages exchanged after the handshake.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (framed bytes) and the
//! network manager. It doesn't know about sockets or characters.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → NetworkManager (events)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AttackPayload, EndTurnPayload, Envelope, InteractPayload, MessageType, MovePayload,
    TextPayload,
};
