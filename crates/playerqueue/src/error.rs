//! Unified error type for the player queue.

use playerqueue_client::ClientError;
use playerqueue_lobby::LobbyError;
use playerqueue_protocol::ProtocolError;
use playerqueue_transport::TransportError;

use crate::CollaboratorError;

/// Top-level error that wraps all crate-specific errors.
///
/// Sub-crate errors convert automatically through `?`. The domain variants
/// are what the moderation surface reports back to its caller, see
/// [`status_code`](Self::status_code).
#[derive(Debug, thiserror::Error)]
pub enum PlayerQueueError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, unknown op).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client-level error (auth, closed, queue full).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A lobby-level error (address resolution).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A collaborator (profiles, chat store, feed) failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// The request was malformed: empty message, invalid Steam ID, ...
    #[error("bad input: {0}")]
    BadInput(String),

    /// No identity could be established for the caller.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The caller is not allowed to perform the action.
    #[error("permission denied")]
    PermissionDenied,

    /// The change is a no-op, e.g. setting the status a user already has.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl PlayerQueueError {
    /// The HTTP status a moderation endpoint should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadInput(_) => 400,
            Self::Unauthenticated | Self::Client(ClientError::AuthFailed(_)) => 401,
            Self::PermissionDenied => 403,
            Self::Collaborator(CollaboratorError::NotFound(_)) => 404,
            Self::Duplicate(_) => 409,
            _ => 500,
        }
    }
}
