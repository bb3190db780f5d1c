//! The identity record a client is registered under.

use playerqueue_protocol::{ChatStatus, Member, SteamId};

/// Permission level of a regular signed-in player.
pub const PERMISSION_USER: i32 = 10;
/// Lowest permission level allowed to moderate chat.
pub const PERMISSION_MODERATOR: i32 = 50;
/// Full administrative access.
pub const PERMISSION_ADMIN: i32 = 100;

/// What the profile provider knows about a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub steam_id: SteamId,
    pub name: String,
    pub avatar_hash: String,
    pub permission_level: i32,
    pub chat_status: ChatStatus,
}

impl Profile {
    /// A regular player with full chat access.
    pub fn new(steam_id: SteamId, name: impl Into<String>) -> Self {
        Self {
            steam_id,
            name: name.into(),
            avatar_hash: String::new(),
            permission_level: PERMISSION_USER,
            chat_status: ChatStatus::Readwrite,
        }
    }

    /// The public part of the profile, as shown in user lists.
    pub fn member(&self) -> Member {
        Member {
            name: self.name.clone(),
            steam_id: self.steam_id,
            hash: self.avatar_hash.clone(),
        }
    }
}
