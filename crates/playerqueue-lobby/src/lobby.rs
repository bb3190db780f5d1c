//! A single lobby: occupancy, queued members, and connect strings.

use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};

use playerqueue_protocol::{LobbyServer, LobbyState, ServerId, SteamId};
use serde::{Deserialize, Serialize};

use crate::LobbyError;

// ---------------------------------------------------------------------------
// LobbyInfo
// ---------------------------------------------------------------------------

/// One game server as reported by the live occupancy feed.
///
/// `Deserialize` lets static deployments list their servers in the config
/// file instead of running a live feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyInfo {
    pub server_id: ServerId,
    pub title: String,
    pub short_name: String,
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub player_count: u32,
    pub max_players: u32,
}

impl LobbyInfo {
    /// Resolves the server's hostname to an IP address, preferring IPv4.
    ///
    /// An IP literal is returned as-is without a lookup.
    ///
    /// # Errors
    /// [`LobbyError::Resolve`] if the lookup fails, [`LobbyError::NoAddress`]
    /// if it returns nothing.
    pub async fn resolve_ip(&self) -> Result<IpAddr, LobbyError> {
        if let Ok(ip) = self.hostname.parse::<IpAddr>() {
            return Ok(ip);
        }

        let addrs: Vec<SocketAddr> =
            tokio::net::lookup_host((self.hostname.as_str(), self.port))
                .await
                .map_err(|source| LobbyError::Resolve {
                    hostname: self.hostname.clone(),
                    source,
                })?
                .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .map(SocketAddr::ip)
            .ok_or_else(|| LobbyError::NoAddress(self.hostname.clone()))
    }

    /// The Steam URL that launches the game and joins this server.
    pub fn connect_url(&self, ip: IpAddr) -> String {
        format!("steam://connect/{ip}:{}", self.port)
    }

    /// The console command that joins this server.
    pub fn connect_command(&self) -> String {
        format!("connect {}:{}", self.hostname, self.port)
    }

    /// The server block of a `StartGame` payload.
    pub fn server(&self, ip: IpAddr) -> LobbyServer {
        LobbyServer {
            name: self.title.clone(),
            short_name: self.short_name.clone(),
            cc: self.cc.clone(),
            connect_url: self.connect_url(ip),
            connect_command: self.connect_command(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// A lobby: the live feed's view of a server plus the players queued for it.
#[derive(Debug, Clone)]
pub struct Lobby {
    info: LobbyInfo,
    members: BTreeSet<SteamId>,
}

impl Lobby {
    /// Creates a lobby with no queued members.
    pub fn new(info: LobbyInfo) -> Self {
        Self {
            info,
            members: BTreeSet::new(),
        }
    }

    pub fn server_id(&self) -> ServerId {
        self.info.server_id
    }

    pub fn info(&self) -> &LobbyInfo {
        &self.info
    }

    /// Queued members, in identity order.
    pub fn members(&self) -> impl Iterator<Item = SteamId> + '_ {
        self.members.iter().copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, steam_id: SteamId) -> bool {
        self.members.contains(&steam_id)
    }

    /// Queues a player. Returns `false` if they were already queued.
    pub fn join(&mut self, steam_id: SteamId) -> bool {
        self.members.insert(steam_id)
    }

    /// Removes a player from the queue. Returns `false` if they weren't in it.
    pub fn leave(&mut self, steam_id: SteamId) -> bool {
        self.members.remove(&steam_id)
    }

    /// Takes the feed's latest record for this server wholesale. Members
    /// are kept.
    pub fn refresh(&mut self, info: LobbyInfo) {
        debug_assert_eq!(info.server_id, self.info.server_id);
        self.info = info;
    }

    /// Slots left on the server once every queued member has joined.
    /// Negative when the queue would overflow it.
    pub fn free_slots(&self) -> i64 {
        i64::from(self.info.max_players)
            - i64::from(self.info.player_count)
            - self.members.len() as i64
    }

    /// Whether the lobby has enough queued players and the server has
    /// room for all of them.
    pub fn is_eligible(&self, min_queue_size: usize) -> bool {
        self.members.len() >= min_queue_size && self.free_slots() >= 0
    }

    /// The lobby as shown in a `StateUpdate`.
    pub fn state(&self) -> LobbyState {
        LobbyState {
            server_id: self.info.server_id,
            members: self.members().collect(),
        }
    }
}
