//! `PlayerQueueServer` builder and accept loop.
//!
//! This is the entry point for running the queue. It ties together all
//! the layers: transport → protocol → client → coordinator.

use std::sync::Arc;

use playerqueue_client::{Authenticator, ClientConfig};
use playerqueue_transport::{Transport, WebSocketTransport};
use tokio_util::sync::CancellationToken;

use crate::handler::handle_connection;
use crate::{
    Authorizer, ChatStore, Coordinator, LobbyFeed, PlayerQueue, PlayerQueueError, ProfileProvider,
    QueueConfig,
};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, S, P, Z> {
    pub(crate) auth: A,
    pub(crate) queue: PlayerQueue<S, P, Z>,
    pub(crate) client_config: ClientConfig,
}

/// Builder for configuring and starting a player queue server.
///
/// # Example
///
/// ```rust,ignore
/// use playerqueue::prelude::*;
///
/// let server = PlayerQueueServer::builder()
///     .config(config)
///     .build(auth, MemoryChatStore::new(), MemoryProfiles::new(), PermissionAuthorizer)
///     .await?;
/// server.run(feed, shutdown).await
/// ```
pub struct PlayerQueueServerBuilder {
    config: QueueConfig,
}

impl PlayerQueueServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.listen_addr = addr.to_string();
        self
    }

    /// Binds the listener, creates the coordinator and seeds its chat
    /// history from the store.
    pub async fn build<A, S, P, Z>(
        self,
        auth: A,
        store: S,
        profiles: P,
        authorizer: Z,
    ) -> Result<PlayerQueueServer<A, S, P, Z>, PlayerQueueError>
    where
        A: Authenticator,
        S: ChatStore,
        P: ProfileProvider,
        Z: Authorizer,
    {
        let config = self.config.validated();
        let transport = WebSocketTransport::bind(&config.listen_addr)
            .await?
            .with_allowed_origins(config.allowed_origins.clone());

        let coordinator = Arc::new(Coordinator::new(&config));
        let queue = PlayerQueue::new(coordinator, store, profiles, authorizer, &config);
        let seeded = queue.seed_history().await?;
        tracing::debug!(messages = seeded, "chat history loaded");

        let state = Arc::new(ServerState {
            auth,
            queue,
            client_config: config.client_config(),
        });
        Ok(PlayerQueueServer { transport, state })
    }
}

impl Default for PlayerQueueServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound player queue server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PlayerQueueServer<A, S, P, Z> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, P, Z>>,
}

impl PlayerQueueServer<(), (), (), ()> {
    /// Creates a new builder.
    pub fn builder() -> PlayerQueueServerBuilder {
        PlayerQueueServerBuilder::new()
    }
}

impl<A, S, P, Z> PlayerQueueServer<A, S, P, Z>
where
    A: Authenticator,
    S: ChatStore,
    P: ProfileProvider,
    Z: Authorizer,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The service, for moderation calls from outside the socket layer.
    pub fn queue(&self) -> &PlayerQueue<S, P, Z> {
        &self.state.queue
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(self.state.queue.coordinator())
    }

    /// Runs the coordinator loops and the accept loop until `shutdown` is
    /// cancelled.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// On shutdown, stops accepting and waits for the coordinator to say
    /// goodbye to every client.
    pub async fn run<F: LobbyFeed>(
        mut self,
        feed: F,
        shutdown: CancellationToken,
    ) -> Result<(), PlayerQueueError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "player queue running");

        let coordinator = self.coordinator();
        let coordinator_shutdown = shutdown.clone();
        let coordinator_task =
            tokio::spawn(async move { coordinator.run(feed, coordinator_shutdown).await });

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }

        self.transport.shutdown().await?;
        if let Err(e) = coordinator_task.await {
            tracing::error!(error = %e, "coordinator task failed");
        }
        tracing::info!("player queue stopped");
        Ok(())
    }
}
