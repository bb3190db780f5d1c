//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use playerqueue::Coordinator;
use playerqueue_client::{ClientError, Profile, QueueClient};
use playerqueue_lobby::LobbyInfo;
use playerqueue_protocol::{ChatLogEntry, ChatStatus, Member, Op, Response, ServerId, SteamId};
use playerqueue_transport::ConnectionId;
use tokio_util::sync::CancellationToken;

// =========================================================================
// Fake client
// =========================================================================

static NEXT_CONN: AtomicU64 = AtomicU64::new(1);

/// Records every response it is sent, in order.
pub struct FakeClient {
    id: ConnectionId,
    profile: Profile,
    status: Mutex<ChatStatus>,
    received: Mutex<Vec<Response>>,
    pub started: AtomicBool,
    closed: AtomicBool,
    last_seen: Mutex<Instant>,
}

impl FakeClient {
    pub fn new(account: u32) -> Arc<Self> {
        Self::with_status(account, ChatStatus::Readwrite)
    }

    pub fn with_status(account: u32, status: ChatStatus) -> Arc<Self> {
        Self::with_profile(Profile {
            chat_status: status,
            ..Profile::new(SteamId::from_account(account), format!("player-{account}"))
        })
    }

    pub fn with_profile(profile: Profile) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(NEXT_CONN.fetch_add(1, Ordering::Relaxed)),
            status: Mutex::new(profile.chat_status),
            profile,
            received: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_seen: Mutex::new(Instant::now()),
        })
    }

    pub fn responses(&self) -> Vec<Response> {
        self.received.lock().clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.received.lock().iter().map(Response::op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.ops().into_iter().filter(|o| *o == op).count()
    }

    pub fn clear(&self) {
        self.received.lock().clear();
    }

    pub fn message_ids(&self) -> Vec<i64> {
        self.received
            .lock()
            .iter()
            .filter_map(|r| match r {
                Response::Message(entry) => Some(entry.message_id),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn backdate(&self, by: Duration) {
        *self.last_seen.lock() = Instant::now() - by;
    }
}

impl QueueClient for FakeClient {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn steam_id(&self) -> SteamId {
        self.profile.steam_id
    }

    fn member(&self) -> Member {
        self.profile.member()
    }

    fn permission_level(&self) -> i32 {
        self.profile.permission_level
    }

    fn chat_status(&self) -> ChatStatus {
        *self.status.lock()
    }

    fn set_chat_status(&self, status: ChatStatus) {
        *self.status.lock() = status;
    }

    fn send(&self, response: Response) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.received.lock().push(response);
        Ok(())
    }

    fn start(&self, _shutdown: &CancellationToken) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn last_seen(&self) -> Instant {
        *self.last_seen.lock()
    }
}

// =========================================================================
// Fixtures
// =========================================================================

pub fn sid(account: u32) -> SteamId {
    SteamId::from_account(account)
}

pub fn lobby(id: u32, player_count: u32, max_players: u32) -> LobbyInfo {
    LobbyInfo {
        server_id: ServerId(id),
        title: format!("Server {id}"),
        short_name: format!("srv-{id}"),
        hostname: "127.0.0.1".into(),
        port: 27015,
        cc: "us".into(),
        player_count,
        max_players,
    }
}

pub fn entry(message_id: i64, account: u32) -> ChatLogEntry {
    ChatLogEntry {
        message_id,
        steam_id: sid(account),
        created_on: Utc::now(),
        personaname: format!("player-{account}"),
        avatarhash: String::new(),
        permission_level: 10,
        body_md: format!("message {message_id}"),
        deleted: false,
    }
}

pub fn connect(coordinator: &Coordinator, client: &Arc<FakeClient>) {
    coordinator.connect(Arc::clone(client) as Arc<dyn QueueClient>);
}

