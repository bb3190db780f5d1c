//! In-process collaborators.
//!
//! Good enough for a single-node deployment with a static server list and
//! for tests. A real deployment plugs in its database, profile service and
//! occupancy poller through the traits in [`external`](crate::external).

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use playerqueue_client::{PERMISSION_MODERATOR, Profile};
use playerqueue_lobby::LobbyInfo;
use playerqueue_protocol::{ChatLogEntry, ChatStatus, SteamId};

use crate::{
    Authorizer, ChatStore, CollaboratorError, LobbyFeed, ModerationAction, ProfileProvider,
};

// ---------------------------------------------------------------------------
// Chat store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ChatLog {
    entries: Vec<ChatLogEntry>,
    last_id: i64,
}

/// Keeps every message in memory and assigns ids sequentially from 1.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    log: Mutex<ChatLog>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for MemoryChatStore {
    async fn save(&self, mut entry: ChatLogEntry) -> Result<ChatLogEntry, CollaboratorError> {
        let mut log = self.log.lock();
        log.last_id += 1;
        entry.message_id = log.last_id;
        log.entries.push(entry.clone());
        Ok(entry)
    }

    async fn message(&self, message_id: i64) -> Result<ChatLogEntry, CollaboratorError> {
        self.log
            .lock()
            .entries
            .iter()
            .find(|e| e.message_id == message_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("message {message_id}")))
    }

    async fn delete(&self, message_ids: &[i64]) -> Result<(), CollaboratorError> {
        let mut log = self.log.lock();
        for entry in log.entries.iter_mut() {
            if message_ids.contains(&entry.message_id) {
                entry.deleted = true;
            }
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatLogEntry>, CollaboratorError> {
        let log = self.log.lock();
        let mut newest: Vec<ChatLogEntry> = log
            .entries
            .iter()
            .rev()
            .filter(|e| !e.deleted)
            .take(limit)
            .cloned()
            .collect();
        newest.reverse();
        Ok(newest)
    }
}

// ---------------------------------------------------------------------------
// Lobby feed
// ---------------------------------------------------------------------------

/// A feed that reports a fixed (but replaceable) list of servers.
#[derive(Debug, Default)]
pub struct StaticLobbyFeed {
    lobbies: RwLock<Vec<LobbyInfo>>,
}

impl StaticLobbyFeed {
    pub fn new(lobbies: Vec<LobbyInfo>) -> Self {
        Self {
            lobbies: RwLock::new(lobbies),
        }
    }

    /// Replaces what the next poll returns.
    pub fn set_lobbies(&self, lobbies: Vec<LobbyInfo>) {
        *self.lobbies.write() = lobbies;
    }
}

impl LobbyFeed for StaticLobbyFeed {
    async fn current_lobbies(&self) -> Result<Vec<LobbyInfo>, CollaboratorError> {
        Ok(self.lobbies.read().clone())
    }
}

impl<F: LobbyFeed> LobbyFeed for std::sync::Arc<F> {
    fn current_lobbies(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<LobbyInfo>, CollaboratorError>> + Send {
        (**self).current_lobbies()
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Profiles kept in a map. Unknown players get a regular profile on first
/// lookup.
#[derive(Debug, Default)]
pub struct MemoryProfiles {
    profiles: RwLock<HashMap<SteamId, Profile>>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a profile.
    pub fn insert(&self, profile: Profile) {
        self.profiles.write().insert(profile.steam_id, profile);
    }

    pub fn get(&self, steam_id: SteamId) -> Option<Profile> {
        self.profiles.read().get(&steam_id).cloned()
    }
}

impl ProfileProvider for MemoryProfiles {
    async fn profile(&self, steam_id: SteamId) -> Result<Profile, CollaboratorError> {
        let mut profiles = self.profiles.write();
        let profile = profiles
            .entry(steam_id)
            .or_insert_with(|| Profile::new(steam_id, format!("player-{steam_id}")));
        Ok(profile.clone())
    }

    async fn set_chat_status(
        &self,
        steam_id: SteamId,
        status: ChatStatus,
    ) -> Result<(), CollaboratorError> {
        let mut profiles = self.profiles.write();
        let profile = profiles
            .get_mut(&steam_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("profile {steam_id}")))?;
        profile.chat_status = status;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Rank-based moderation: moderators and up may act on anyone ranked
/// strictly below them.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionAuthorizer;

impl Authorizer for PermissionAuthorizer {
    async fn authorize(&self, actor: &Profile, action: &ModerationAction) -> bool {
        let target = action.target();
        actor.permission_level >= PERMISSION_MODERATOR
            && actor.permission_level > target.permission_level
            && actor.steam_id != target.steam_id
    }
}
