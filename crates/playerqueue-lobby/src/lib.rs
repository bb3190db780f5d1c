//! Lobby records for the player queue.
//!
//! A lobby is the matchmaking queue in front of one game server. It holds
//! a copy of the server's occupancy (mirrored from the live feed) and the
//! set of players waiting to join it together.
//!
//! # Key types
//!
//! - [`LobbyInfo`]: what the live feed says about a server
//! - [`Lobby`]: a feed record plus its queued members
//! - [`LobbyRegistry`]: every known lobby, keyed and ordered by server id
//!
//! Nothing here is synchronized. The coordinator owns the registry and
//! only touches it under its own lock.

mod error;
mod lobby;
mod registry;

pub use error::LobbyError;
pub use lobby::{Lobby, LobbyInfo};
pub use registry::{LobbyRegistry, Reconciled};
