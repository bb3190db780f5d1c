//! Per-connection handler: authentication, registration and request
//! routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Authenticate the upgrade token → get SteamId
//!   2. Resolve the profile → register the client with the coordinator
//!   3. Loop: read requests → dispatch join / leave / message
//!   4. On a closed or broken connection → disconnect

use std::sync::Arc;

use playerqueue_client::{Authenticator, Client, ClientError, QueueClient};
use playerqueue_protocol::{Request, SteamId};
use playerqueue_transport::{Connection, WebSocketConnection};

use crate::server::ServerState;
use crate::{Authorizer, ChatStore, PlayerQueueError, ProfileProvider};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, P, Z>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, S, P, Z>>,
) -> Result<(), PlayerQueueError>
where
    A: Authenticator,
    S: ChatStore,
    P: ProfileProvider,
    Z: Authorizer,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Authenticate ---
    let steam_id = match authenticate(&conn, &state.auth).await {
        Ok(steam_id) => steam_id,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "rejecting connection");
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let profile = match state.queue.profiles().profile(steam_id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(%conn_id, %steam_id, error = %e, "profile lookup failed");
            let _ = conn.close().await;
            return Err(e.into());
        }
    };

    // --- Step 2: Register ---
    let client = Arc::new(Client::new(conn, profile, &state.client_config));
    let coordinator = state.queue.coordinator();
    coordinator.connect(Arc::clone(&client) as Arc<dyn QueueClient>);

    // --- Step 3: Request loop ---
    loop {
        let request = match client.next().await {
            Ok(request) => request,
            Err(e) if e.is_fatal() => {
                tracing::debug!(%conn_id, %steam_id, error = %e, "read loop ended");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, %steam_id, error = %e, "dropping malformed frame");
                continue;
            }
        };

        match request {
            Request::JoinQueue(payload) => {
                coordinator.join(steam_id, &payload.servers).await;
            }
            Request::LeaveQueue(payload) => {
                coordinator.leave(steam_id, &payload.servers);
            }
            Request::Message(payload) => {
                if let Err(e) = state.queue.add_message(client.as_ref(), &payload.body_md).await {
                    match e {
                        PlayerQueueError::BadInput(_) | PlayerQueueError::PermissionDenied => {
                            tracing::debug!(%steam_id, error = %e, "message rejected");
                        }
                        e => tracing::warn!(%steam_id, error = %e, "message failed"),
                    }
                }
            }
        }
    }

    // --- Step 4: Disconnect ---
    coordinator.disconnect(client.as_ref());
    Ok(())
}

async fn authenticate<A: Authenticator>(
    conn: &WebSocketConnection,
    auth: &A,
) -> Result<SteamId, PlayerQueueError> {
    let token = conn
        .token()
        .ok_or_else(|| ClientError::AuthFailed("missing token".into()))?;
    let steam_id = auth.authenticate(token).await?;
    if !steam_id.is_valid() {
        return Err(PlayerQueueError::Unauthenticated);
    }
    Ok(steam_id)
}
