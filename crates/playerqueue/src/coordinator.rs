//! The coordinator: single owner of queue membership, connected clients
//! and the chat history.
//!
//! # Locking
//!
//! All state sits behind one `parking_lot::RwLock`. Every operation takes
//! the lock, mutates, enqueues its broadcasts, and releases it. Enqueueing
//! ([`QueueClient::send`]) never does I/O, so holding the lock across a
//! broadcast is cheap, and it makes the order in which a client receives
//! responses equal to the order the operations acquired the lock.
//!
//! The lock is never held across an `.await`. The only slow step of a
//! match, resolving the server's address, runs between a read-locked
//! snapshot and a write-locked re-check.
//!
//! # Background loops
//!
//! [`Coordinator::run`] drives two [`TickScheduler`]s:
//!
//! ```text
//! reconcile (2s)   feed.current_lobbies() → registry.reconcile() → match check
//! eviction  (30s)  clients idle past the timeout → leave all lobbies, close
//! ```
//!
//! Cancelling the run token broadcasts `Bye` and then tells every client
//! writer to drain and stop.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use playerqueue_client::QueueClient;
use playerqueue_lobby::{LobbyInfo, LobbyRegistry};
use playerqueue_protocol::{
    ByePayload, ChatLogEntry, ChatStatus, ChatStatusChangePayload, GameStartPayload, LobbyState,
    Member, PurgePayload, Response, ServerId, StateUpdatePayload, SteamId,
};
use playerqueue_tick::TickScheduler;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatHistory;
use crate::{LobbyFeed, QueueConfig};

/// Text of the notice broadcast when the coordinator shuts down.
pub const BYE_MESSAGE: &str = "Server shutting down... run!!!";

/// Everything the lock protects.
struct CoordinatorState {
    clients: HashMap<SteamId, Arc<dyn QueueClient>>,
    lobbies: LobbyRegistry,
    chat: ChatHistory,
}

impl CoordinatorState {
    /// Enqueues `response` for every client that passes `filter`.
    fn broadcast(&self, response: &Response, filter: impl Fn(&dyn QueueClient) -> bool) {
        for client in self.clients.values() {
            if filter(client.as_ref()) {
                deliver(client.as_ref(), response.clone());
            }
        }
    }

    fn broadcast_all(&self, response: &Response) {
        self.broadcast(response, |_| true);
    }

    /// A `StateUpdate` carrying the requested halves.
    fn state_update(&self, users: bool, servers: bool) -> Response {
        let mut members = Vec::new();
        if users {
            members = self.clients.values().map(|c| c.member()).collect::<Vec<Member>>();
            members.sort_by_key(|m| m.steam_id);
        }
        Response::StateUpdate(StateUpdatePayload {
            update_users: users,
            update_servers: servers,
            servers: if servers { self.lobbies.states() } else { Vec::new() },
            users: members,
        })
    }

    fn replay_history(&self, client: &dyn QueueClient) {
        for entry in self.chat.iter() {
            deliver(client, Response::Message(entry.clone()));
        }
    }

    /// Drops a client from the registry and from every lobby.
    fn remove_client(&mut self, steam_id: SteamId) -> Option<Arc<dyn QueueClient>> {
        let client = self.clients.remove(&steam_id)?;
        self.lobbies.leave_all(steam_id);
        Some(client)
    }
}

/// Enqueues one response. Failures only concern that client: a full queue
/// is already logged by the client, a closed one is about to be removed.
fn deliver(client: &dyn QueueClient, response: Response) {
    if let Err(e) = client.send(response) {
        tracing::debug!(steam_id = %client.steam_id(), error = %e, "response not delivered");
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Orchestrates lobbies, clients, match starts and chat fan-out.
///
/// Shared as `Arc<Coordinator>` between the connection handlers, the
/// service layer and the background loops.
pub struct Coordinator {
    state: RwLock<CoordinatorState>,
    min_queue_size: usize,
    reconcile_interval: Duration,
    eviction_interval: Duration,
    idle_timeout: Duration,
    /// Handed to every client writer. Cancelled after the goodbye.
    clients_shutdown: CancellationToken,
}

impl Coordinator {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            state: RwLock::new(CoordinatorState {
                clients: HashMap::new(),
                lobbies: LobbyRegistry::new(),
                chat: ChatHistory::new(config.chat_history_size),
            }),
            min_queue_size: config.min_queue_size.max(1),
            reconcile_interval: config.reconcile_interval(),
            eviction_interval: config.eviction_interval(),
            idle_timeout: config.idle_timeout(),
            clients_shutdown: CancellationToken::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    /// Runs reconciliation and zombie eviction until `cancel` fires, then
    /// says goodbye to every client.
    ///
    /// The first reconciliation happens immediately.
    pub async fn run<F: LobbyFeed>(&self, feed: F, cancel: CancellationToken) {
        tracing::info!(
            reconcile_ms = self.reconcile_interval.as_millis() as u64,
            eviction_ms = self.eviction_interval.as_millis() as u64,
            "coordinator running"
        );
        self.update_state(&feed).await;

        let mut reconcile = TickScheduler::every("reconcile", self.reconcile_interval);
        let mut eviction = TickScheduler::every("eviction", self.eviction_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                info = reconcile.wait_for_tick() => {
                    self.update_state(&feed).await;
                    let took = reconcile.record_tick_end();
                    tracing::trace!(tick = info.tick, skipped = info.ticks_skipped, ?took, "reconciled");
                }
                info = eviction.wait_for_tick() => {
                    let evicted = self.evict_zombies();
                    let took = eviction.record_tick_end();
                    tracing::debug!(tick = info.tick, evicted = evicted.len(), ?took, "zombie sweep");
                }
            }
        }

        self.shutdown();
    }

    /// Broadcasts `Bye` and releases the client writers.
    ///
    /// Writers flush what is queued (the goodbye included) before they
    /// close their sockets.
    pub fn shutdown(&self) {
        {
            let state = self.state.read();
            tracing::info!(clients = state.clients.len(), "coordinator shutting down");
            state.broadcast_all(&Response::Bye(ByePayload {
                message: BYE_MESSAGE.to_string(),
            }));
        }
        self.clients_shutdown.cancel();
    }

    // -----------------------------------------------------------------------
    // Client lifecycle
    // -----------------------------------------------------------------------

    /// Registers a connected client and starts its writer.
    ///
    /// An existing client with the same identity is closed and replaced.
    /// The newcomer gets the chat history (if it may read chat), then
    /// everybody gets a full state update.
    pub fn connect(&self, client: Arc<dyn QueueClient>) {
        let steam_id = client.steam_id();
        let mut state = self.state.write();

        if let Some(previous) = state.clients.insert(steam_id, Arc::clone(&client)) {
            tracing::info!(
                %steam_id,
                old_conn = %previous.id(),
                new_conn = %client.id(),
                "replacing existing session"
            );
            previous.close();
        }
        client.start(&self.clients_shutdown);

        if client.has_message_access() {
            state.replay_history(client.as_ref());
        }
        state.broadcast_all(&state.state_update(true, true));

        tracing::info!(%steam_id, conn_id = %client.id(), clients = state.clients.len(), "client connected");
    }

    /// Removes a client, takes it out of every lobby and closes it.
    ///
    /// A client that was already replaced by a newer connection for the
    /// same identity is only closed; the newer one stays registered.
    pub fn disconnect(&self, client: &dyn QueueClient) {
        let steam_id = client.steam_id();
        {
            let mut state = self.state.write();
            let is_current = state
                .clients
                .get(&steam_id)
                .is_some_and(|c| c.id() == client.id());
            if is_current {
                state.remove_client(steam_id);
                state.broadcast_all(&state.state_update(true, true));
                tracing::info!(%steam_id, conn_id = %client.id(), "client disconnected");
            } else {
                tracing::debug!(%steam_id, conn_id = %client.id(), "stale client disconnected");
            }
        }
        client.close();
    }

    /// Closes and removes every client not heard from within the idle
    /// timeout. Returns the evicted identities.
    pub fn evict_zombies(&self) -> Vec<SteamId> {
        let now = Instant::now();
        let mut state = self.state.write();

        let zombies: Vec<SteamId> = state
            .clients
            .values()
            .filter(|c| now.saturating_duration_since(c.last_seen()) > self.idle_timeout)
            .map(|c| c.steam_id())
            .collect();

        for steam_id in &zombies {
            if let Some(client) = state.remove_client(*steam_id) {
                tracing::info!(%steam_id, conn_id = %client.id(), "evicting idle client");
                client.close();
            }
        }
        if !zombies.is_empty() {
            state.broadcast_all(&state.state_update(true, true));
        }
        zombies
    }

    pub fn client_count(&self) -> usize {
        self.state.read().clients.len()
    }

    pub fn is_connected(&self, steam_id: SteamId) -> bool {
        self.state.read().clients.contains_key(&steam_id)
    }

    // -----------------------------------------------------------------------
    // Queue membership
    // -----------------------------------------------------------------------

    /// Queues a player for the named lobbies, then looks for a match.
    ///
    /// Unknown lobbies are ignored. Nothing is broadcast if the player was
    /// already queued everywhere.
    pub async fn join(&self, steam_id: SteamId, servers: &[ServerId]) {
        {
            let mut state = self.state.write();
            if !state.clients.contains_key(&steam_id) {
                tracing::debug!(%steam_id, "join from unregistered client ignored");
                return;
            }
            if !state.lobbies.join(steam_id, servers) {
                return;
            }
            tracing::debug!(%steam_id, ?servers, "joined queue");
            state.broadcast_all(&state.state_update(false, true));
        }
        self.check_queue_compat().await;
    }

    /// Removes a player from the named lobbies.
    pub fn leave(&self, steam_id: SteamId, servers: &[ServerId]) {
        let mut state = self.state.write();
        if state.lobbies.leave(steam_id, servers) {
            tracing::debug!(%steam_id, ?servers, "left queue");
            state.broadcast_all(&state.state_update(false, true));
        }
    }

    /// Current members of every lobby, ordered by server id.
    pub fn lobby_states(&self) -> Vec<LobbyState> {
        self.state.read().lobbies.states()
    }

    // -----------------------------------------------------------------------
    // Reconciliation and matching
    // -----------------------------------------------------------------------

    /// One reconciliation pass against the live feed, followed by a match
    /// check. A feed failure keeps the previous lobbies.
    pub async fn update_state<F: LobbyFeed>(&self, feed: &F) {
        let lobbies = match feed.current_lobbies().await {
            Ok(lobbies) => lobbies,
            Err(e) => {
                tracing::warn!(error = %e, "live feed unavailable, keeping previous lobbies");
                return;
            }
        };

        {
            let mut state = self.state.write();
            let outcome = state.lobbies.reconcile(lobbies);
            if outcome.changed() {
                tracing::debug!(
                    added = outcome.added.len(),
                    removed = outcome.removed.len(),
                    "lobby set changed"
                );
                state.broadcast_all(&state.state_update(false, true));
            }
        }

        self.check_queue_compat().await;
    }

    /// Starts a match on the first eligible lobby, if there is one.
    ///
    /// The matched players get `StartGame` and are taken out of every
    /// queue; everybody then gets a servers update. A lobby whose members
    /// are not all connected, or whose address does not resolve, is
    /// skipped and left as is; the scan moves on to the next one. Returns
    /// the lobby that started.
    pub async fn check_queue_compat(&self) -> Option<ServerId> {
        let candidates: Vec<(LobbyInfo, Vec<SteamId>)> = {
            let state = self.state.read();
            let candidates = state
                .lobbies
                .eligible(self.min_queue_size, |sid| state.clients.contains_key(&sid))
                .map(|lobby| (lobby.info().clone(), lobby.members().collect()))
                .collect();
            candidates
        };

        for (info, members) in candidates {
            let server_id = info.server_id;
            let ip = match info.resolve_ip().await {
                Ok(ip) => ip,
                Err(e) => {
                    tracing::warn!(%server_id, error = %e, "cannot resolve lobby address, skipping");
                    continue;
                }
            };
            if self.start_game(&info, &members, ip) {
                return Some(server_id);
            }
        }
        None
    }

    /// Second half of a match: re-checks the lobby under the write lock and
    /// sends `StartGame`. Returns `false` if the queue moved meanwhile.
    fn start_game(&self, info: &LobbyInfo, members: &[SteamId], ip: IpAddr) -> bool {
        let server_id = info.server_id;
        let mut state = self.state.write();

        // The queue may have moved while the address was resolving.
        let unchanged = state.lobbies.get(server_id).is_some_and(|lobby| {
            lobby.is_eligible(self.min_queue_size) && lobby.members().eq(members.iter().copied())
        });
        if !unchanged || !members.iter().all(|sid| state.clients.contains_key(sid)) {
            tracing::debug!(%server_id, "lobby changed during match setup, deferred");
            return false;
        }

        let matched: Vec<Arc<dyn QueueClient>> = members
            .iter()
            .filter_map(|sid| state.clients.get(sid).cloned())
            .collect();
        let start = Response::StartGame(GameStartPayload {
            server: info.server(ip),
            users: matched.iter().map(|c| c.member()).collect(),
        });
        for client in &matched {
            deliver(client.as_ref(), start.clone());
        }

        for steam_id in members {
            state.lobbies.leave_all(*steam_id);
        }
        state.broadcast_all(&state.state_update(false, true));

        tracing::info!(%server_id, players = members.len(), "match started");
        true
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    /// Loads persisted messages into an empty history, oldest first.
    pub fn seed_history(&self, entries: Vec<ChatLogEntry>) {
        let mut state = self.state.write();
        for entry in entries {
            state.chat.push(entry);
        }
        tracing::debug!(messages = state.chat.len(), "chat history seeded");
    }

    /// Records a stored message and sends it to every client that may
    /// read chat.
    pub fn message(&self, entry: ChatLogEntry) {
        let mut state = self.state.write();
        let response = Response::Message(entry.clone());
        state.chat.push(entry);
        state.broadcast(&response, |c| c.has_message_access());
    }

    /// Drops messages from the history and tells every client to remove
    /// them. Returns the ids that were cached.
    pub fn purge_messages(&self, message_ids: &[i64]) -> Vec<i64> {
        if message_ids.is_empty() {
            return Vec::new();
        }
        let mut state = self.state.write();
        let removed = state.chat.remove(message_ids);
        state.broadcast_all(&Response::Purge(PurgePayload {
            message_ids: message_ids.to_vec(),
        }));
        tracing::info!(purged = message_ids.len(), cached = removed.len(), "messages purged");
        removed
    }

    /// One cached message.
    pub fn cached_message(&self, message_id: i64) -> Option<ChatLogEntry> {
        self.state.read().chat.get(message_id).cloned()
    }

    /// Up to `limit` cached messages by one author, newest first.
    pub fn find_messages(&self, steam_id: SteamId, limit: usize) -> Vec<ChatLogEntry> {
        self.state.read().chat.find_by_author(steam_id, limit)
    }

    /// The newest `limit` cached messages, oldest first.
    pub fn recent_messages(&self, limit: usize) -> Vec<ChatLogEntry> {
        self.state.read().chat.recent(limit)
    }

    /// Applies a chat status change to a connected client and notifies it.
    ///
    /// A client regaining read access gets the history replayed. Returns
    /// the client's previous status, or `None` if it is not connected.
    pub fn update_chat_status(
        &self,
        steam_id: SteamId,
        status: ChatStatus,
        reason: &str,
    ) -> Option<ChatStatus> {
        let state = self.state.write();
        let client = state.clients.get(&steam_id)?;

        let previous = client.chat_status();
        client.set_chat_status(status);
        deliver(
            client.as_ref(),
            Response::ChatStatusChange(ChatStatusChangePayload {
                status,
                reason: reason.to_string(),
            }),
        );
        if !previous.has_message_access() && status.has_message_access() {
            state.replay_history(client.as_ref());
        }

        tracing::info!(%steam_id, from = %previous, to = %status, "chat status changed");
        Some(previous)
    }
}
