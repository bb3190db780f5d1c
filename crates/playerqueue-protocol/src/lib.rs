//! Wire protocol for the player queue.
//!
//! This crate defines the "language" that browser clients and the
//! coordinator speak:
//!
//! - **Types** ([`SteamId`], [`ServerId`], [`ChatStatus`], [`Op`]): the
//!   small values everything else is keyed by.
//! - **Messages** ([`Request`], [`Response`] and their payloads): the
//!   frames that travel on the wire, modelled as tagged unions.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the client
//! layer (a user's connection). It knows nothing about lobbies or chat
//! history; it only knows how frames look.
//!
//! ```text
//! Transport (bytes) → Protocol (Request/Response) → Client → Coordinator
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{
    ByePayload, ChatLogEntry, ChatStatusChangePayload, Frame,
    GameStartPayload, LobbyServer, LobbyState, Member, MessagePayload,
    PurgePayload, QueuePayload, Request, Response, StateUpdatePayload,
};
pub use types::{ChatStatus, Op, ServerId, SteamId};
