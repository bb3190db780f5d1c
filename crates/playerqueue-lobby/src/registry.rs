//! Lobby registry: every known lobby, reconciled against the live feed.

use std::collections::BTreeMap;

use playerqueue_protocol::{LobbyState, ServerId, SteamId};

use crate::{Lobby, LobbyInfo};

/// What changed during a [`LobbyRegistry::reconcile`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Lobbies that appeared in the feed for the first time.
    pub added: Vec<ServerId>,
    /// Lobbies that vanished from the feed, with their queues.
    pub removed: Vec<ServerId>,
}

impl Reconciled {
    /// Whether the set of lobby ids changed.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// All lobbies, keyed and iterated in ascending server id.
///
/// Ordering by id makes the match scan deterministic.
#[derive(Debug, Default)]
pub struct LobbyRegistry {
    lobbies: BTreeMap<ServerId, Lobby>,
}

impl LobbyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    pub fn get(&self, server_id: ServerId) -> Option<&Lobby> {
        self.lobbies.get(&server_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.values()
    }

    /// Replaces the lobby set with the feed's view.
    ///
    /// Known lobbies take the feed's record as is (address and occupancy
    /// alike) and keep their queues. New lobbies start empty. Lobbies missing from the feed are
    /// dropped together with their queues.
    pub fn reconcile(&mut self, feed: Vec<LobbyInfo>) -> Reconciled {
        let mut outcome = Reconciled::default();
        let mut next = BTreeMap::new();

        for info in feed {
            let server_id = info.server_id;
            let lobby = match self.lobbies.remove(&server_id) {
                Some(mut lobby) => {
                    lobby.refresh(info);
                    lobby
                }
                None => {
                    outcome.added.push(server_id);
                    Lobby::new(info)
                }
            };
            next.insert(server_id, lobby);
        }

        for (server_id, lobby) in std::mem::replace(&mut self.lobbies, next) {
            if lobby.member_count() > 0 {
                tracing::info!(
                    %server_id,
                    members = lobby.member_count(),
                    "lobby left the feed, dropping its queue"
                );
            }
            outcome.removed.push(server_id);
        }

        outcome
    }

    /// Queues a player for each named lobby. Unknown ids are ignored.
    ///
    /// Returns `true` if any membership changed.
    pub fn join(&mut self, steam_id: SteamId, servers: &[ServerId]) -> bool {
        let mut changed = false;
        for server_id in servers {
            if let Some(lobby) = self.lobbies.get_mut(server_id) {
                changed |= lobby.join(steam_id);
            }
        }
        changed
    }

    /// Removes a player from each named lobby. Unknown ids are ignored.
    ///
    /// Returns `true` if any membership changed.
    pub fn leave(&mut self, steam_id: SteamId, servers: &[ServerId]) -> bool {
        let mut changed = false;
        for server_id in servers {
            if let Some(lobby) = self.lobbies.get_mut(server_id) {
                changed |= lobby.leave(steam_id);
            }
        }
        changed
    }

    /// Removes a player from every lobby.
    pub fn leave_all(&mut self, steam_id: SteamId) -> bool {
        let mut changed = false;
        for lobby in self.lobbies.values_mut() {
            changed |= lobby.leave(steam_id);
        }
        changed
    }

    /// Lobbies, in server id order, that are eligible to start and whose
    /// members all pass `is_live`.
    ///
    /// An eligible lobby with a member that is no longer live is skipped,
    /// not repaired. Its membership stays as is until a later pass.
    pub fn eligible<'a>(
        &'a self,
        min_queue_size: usize,
        is_live: impl Fn(SteamId) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Lobby> + 'a {
        self.lobbies.values().filter(move |lobby| {
            if !lobby.is_eligible(min_queue_size) {
                return false;
            }
            if lobby.members().all(&is_live) {
                return true;
            }
            tracing::debug!(
                server_id = %lobby.server_id(),
                "eligible lobby has members without a live client, skipping"
            );
            false
        })
    }

    /// Per-lobby members, as shown in a `StateUpdate`.
    pub fn states(&self) -> Vec<LobbyState> {
        self.lobbies.values().map(Lobby::state).collect()
    }
}
