//! # Player queue
//!
//! Real-time matchmaking queue for a fleet of game servers.
//!
//! Players connect over WebSocket, queue for one or more servers
//! ("lobbies"), and chat. A single [`Coordinator`] owns all of that state:
//! it mirrors server occupancy from a live feed, starts a match as soon as
//! a lobby has enough queued players and room for them, and fans every
//! change out to the connected clients through their ordered outbound
//! queues.
//!
//! ## Layers
//!
//! ```text
//! playerqueue-transport   sockets, upgrade-time token and origin check
//! playerqueue-protocol    op codes, request/response tagged unions
//! playerqueue-client      one connected user, rate limiting, writer task
//! playerqueue-lobby       lobby records, reconciliation, eligibility
//! playerqueue-tick        periodic scheduler for the background loops
//! playerqueue (this)      coordinator, chat, moderation, server
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use playerqueue::prelude::*;
//!
//! // let server = PlayerQueueServer::builder()
//! //     .config(QueueConfig::default())
//! //     .build(my_auth, MemoryChatStore::new(), MemoryProfiles::new(), PermissionAuthorizer)
//! //     .await?;
//! // server.run(StaticLobbyFeed::new(lobbies), CancellationToken::new()).await
//! ```

#![allow(async_fn_in_trait)]

mod chat;
mod config;
mod coordinator;
mod error;
pub mod external;
mod handler;
pub mod memory;
mod server;
mod service;

pub use chat::{ChatHistory, MAX_MESSAGE_LENGTH, sanitize};
pub use config::QueueConfig;
pub use coordinator::{BYE_MESSAGE, Coordinator};
pub use error::PlayerQueueError;
pub use external::{
    Authorizer, ChatStore, CollaboratorError, LobbyFeed, ModerationAction, ProfileProvider,
};
pub use server::{PlayerQueueServer, PlayerQueueServerBuilder};
pub use service::PlayerQueue;

/// Everything needed to embed the queue, in one import.
pub mod prelude {
    pub use crate::memory::{MemoryChatStore, MemoryProfiles, PermissionAuthorizer, StaticLobbyFeed};
    pub use crate::{
        Authorizer, ChatStore, CollaboratorError, Coordinator, LobbyFeed, ModerationAction,
        PlayerQueue, PlayerQueueError, PlayerQueueServer, ProfileProvider, QueueConfig,
    };
    pub use playerqueue_client::{
        Authenticator, ClientConfig, ClientError, PERMISSION_ADMIN, PERMISSION_MODERATOR,
        PERMISSION_USER, Profile, QueueClient,
    };
    pub use playerqueue_lobby::LobbyInfo;
    pub use playerqueue_protocol::{
        ChatLogEntry, ChatStatus, Op, Request, Response, ServerId, SteamId,
    };
    pub use tokio_util::sync::CancellationToken;
}
