//! Collaborator interfaces.
//!
//! The coordinator owns queue and chat state but nothing persistent.
//! Profiles, chat persistence, live server occupancy and moderation policy
//! belong to other systems; the queue reaches them only through these
//! traits. [`memory`](crate::memory) has in-process implementations for
//! the bundled binary and for tests.

use std::future::Future;

use playerqueue_client::Profile;
use playerqueue_lobby::LobbyInfo;
use playerqueue_protocol::{ChatLogEntry, ChatStatus, SteamId};

/// Failure reported by a collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The requested record does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The collaborator could not be reached or failed internally.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Identity and profile resolution.
pub trait ProfileProvider: Send + Sync + 'static {
    /// Looks up (or creates) the profile of a player.
    fn profile(
        &self,
        steam_id: SteamId,
    ) -> impl Future<Output = Result<Profile, CollaboratorError>> + Send;

    /// Persists a player's new chat status.
    fn set_chat_status(
        &self,
        steam_id: SteamId,
        status: ChatStatus,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;
}

/// The live occupancy feed.
///
/// A failure means "skip this pass": the coordinator keeps its previous
/// lobbies and asks again on the next tick.
pub trait LobbyFeed: Send + Sync + 'static {
    fn current_lobbies(
        &self,
    ) -> impl Future<Output = Result<Vec<LobbyInfo>, CollaboratorError>> + Send;
}

/// Chat persistence.
pub trait ChatStore: Send + Sync + 'static {
    /// Stores a new message and returns it with its assigned `message_id`.
    fn save(
        &self,
        entry: ChatLogEntry,
    ) -> impl Future<Output = Result<ChatLogEntry, CollaboratorError>> + Send;

    /// Loads one message by id.
    fn message(
        &self,
        message_id: i64,
    ) -> impl Future<Output = Result<ChatLogEntry, CollaboratorError>> + Send;

    /// Marks messages as deleted.
    fn delete(
        &self,
        message_ids: &[i64],
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    /// The newest `limit` non-deleted messages, oldest first.
    fn recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChatLogEntry>, CollaboratorError>> + Send;
}

/// A moderation action an actor wants to perform on a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    /// Change the target's chat status.
    SetChatStatus { target: Profile, status: ChatStatus },
    /// Remove up to `count` of the target's newest messages.
    Purge { target: Profile, count: usize },
    /// Remove one message written by the target.
    DeleteMessage { target: Profile, message_id: i64 },
}

impl ModerationAction {
    /// The player the action is aimed at.
    pub fn target(&self) -> &Profile {
        match self {
            Self::SetChatStatus { target, .. }
            | Self::Purge { target, .. }
            | Self::DeleteMessage { target, .. } => target,
        }
    }
}

/// Moderation policy.
pub trait Authorizer: Send + Sync + 'static {
    /// Whether `actor` may perform `action`.
    fn authorize(
        &self,
        actor: &Profile,
        action: &ModerationAction,
    ) -> impl Future<Output = bool> + Send;
}
