//! Error types for the client layer.

use playerqueue_protocol::{ProtocolError, SteamId};

/// Errors that can occur while serving one connected client.
///
/// The read loop treats these differently: [`Closed`](Self::Closed) and
/// [`Transport`](Self::Transport) end the session, while
/// [`Protocol`](Self::Protocol) only drops the offending frame.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Authentication failed: the token was missing, invalid, or rejected
    /// by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The connection was closed, either by the peer or by us.
    #[error("connection closed")]
    Closed,

    /// The underlying connection failed while reading.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A frame could not be decoded into a request.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The client's outbound queue is full; the message was dropped.
    #[error("outbound queue full for {0}")]
    QueueFull(SteamId),
}

impl ClientError {
    /// Whether the read loop should stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::Transport(_))
    }
}
