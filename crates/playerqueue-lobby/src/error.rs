//! Error types for the lobby layer.

/// Errors that can occur during lobby operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// Looking up the server's hostname failed.
    #[error("failed to resolve {hostname}: {source}")]
    Resolve {
        hostname: String,
        #[source]
        source: std::io::Error,
    },

    /// The hostname resolved, but to no addresses.
    #[error("no address for {0}")]
    NoAddress(String),
}
