//! One connected user: the capability trait the coordinator depends on
//! and the transport-backed implementation.
//!
//! # Two halves
//!
//! A [`Client`] is driven from two places at once:
//!
//! - **The read path** ([`Client::next`]) is called in a loop by the
//!   connection handler. It waits for a frame, pays the rate limiter,
//!   and decodes the frame into a [`Request`].
//! - **The write path** is a dedicated writer task started by
//!   [`QueueClient::start`]. Everyone else only *enqueues* into a bounded
//!   FIFO via [`QueueClient::send`], which never blocks and never does
//!   I/O. The writer drains that FIFO onto the socket in order.
//!
//! Because enqueueing is synchronous, the order in which the coordinator
//! calls `send` is exactly the order the client receives frames.
//!
//! # Shutdown
//!
//! ```text
//! close()            → own token cancelled → writer closes the socket
//! process shutdown   → shared token cancelled → writer drains, then closes
//! channel closed     → the Client was dropped → writer exits
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use playerqueue_protocol::{
    ChatStatus, Codec, Frame, JsonCodec, Member, Request, Response, SteamId,
};
use playerqueue_transport::{Connection, ConnectionId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{ClientConfig, ClientError, Profile, TokenBucket};

// ---------------------------------------------------------------------------
// QueueClient
// ---------------------------------------------------------------------------

/// What the coordinator needs from a connected user.
///
/// The coordinator stores clients as `Arc<dyn QueueClient>`, so every
/// method is synchronous: sending means enqueueing, closing means
/// signalling. Tests substitute a recording fake.
pub trait QueueClient: Send + Sync + 'static {
    /// The connection this client is bound to. A reconnecting user gets a
    /// new one.
    fn id(&self) -> ConnectionId;

    fn steam_id(&self) -> SteamId;

    /// Name, identity and avatar, as shown in user lists.
    fn member(&self) -> Member;

    fn permission_level(&self) -> i32;

    fn chat_status(&self) -> ChatStatus;

    fn set_chat_status(&self, status: ChatStatus);

    /// Whether chat messages should be delivered to this client.
    fn has_message_access(&self) -> bool {
        self.chat_status().has_message_access()
    }

    /// Enqueues a response without blocking.
    ///
    /// # Errors
    /// - [`ClientError::QueueFull`] if the outbound queue is at capacity;
    ///   the response is dropped.
    /// - [`ClientError::Closed`] if the client has shut down.
    fn send(&self, response: Response) -> Result<(), ClientError>;

    /// Starts the write path. `shutdown` is the process-wide signal after
    /// which the writer drains what is queued and stops.
    fn start(&self, shutdown: &CancellationToken);

    /// Closes the connection. Idempotent.
    fn close(&self);

    /// When the peer was last heard from.
    fn last_seen(&self) -> Instant;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A [`QueueClient`] backed by a transport [`Connection`].
pub struct Client<C: Connection> {
    conn: Arc<C>,
    profile: Profile,
    chat_status: RwLock<ChatStatus>,
    outbound: mpsc::Sender<Response>,
    pending: Mutex<Option<mpsc::Receiver<Response>>>,
    limiter: Option<tokio::sync::Mutex<TokenBucket>>,
    codec: JsonCodec,
    closed: CancellationToken,
    touched: Mutex<Instant>,
    keepalive: Duration,
}

impl<C: Connection> Client<C> {
    /// Wraps an accepted connection for the given player.
    ///
    /// Nothing is written until [`start`](QueueClient::start) is called;
    /// responses sent before that wait in the queue.
    pub fn new(conn: C, profile: Profile, config: &ClientConfig) -> Self {
        let (outbound, pending) = mpsc::channel(config.outbound_capacity.max(1));
        let limiter =
            TokenBucket::new(config.rate_limit_burst, config.rate_limit_refill)
                .map(tokio::sync::Mutex::new);

        Self {
            conn: Arc::new(conn),
            chat_status: RwLock::new(profile.chat_status),
            profile,
            outbound,
            pending: Mutex::new(Some(pending)),
            limiter,
            codec: JsonCodec,
            closed: CancellationToken::new(),
            touched: Mutex::new(Instant::now()),
            keepalive: config.keepalive_interval,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Waits for the next request from the peer.
    ///
    /// # Errors
    /// - [`ClientError::Closed`] when the peer hung up or [`close`](QueueClient::close)
    ///   was called. Callers stop reading.
    /// - [`ClientError::Transport`] when the read itself failed.
    /// - [`ClientError::Protocol`] when the frame was malformed. The frame
    ///   is lost but the connection is still usable.
    pub async fn next(&self) -> Result<Request, ClientError> {
        let data = tokio::select! {
            _ = self.closed.cancelled() => return Err(ClientError::Closed),
            read = self.conn.recv() => match read {
                Ok(Some(data)) => data,
                Ok(None) => return Err(ClientError::Closed),
                Err(e) => return Err(ClientError::Transport(Box::new(e))),
            },
        };
        *self.touched.lock() = Instant::now();

        if let Some(limiter) = &self.limiter {
            tokio::select! {
                _ = self.closed.cancelled() => return Err(ClientError::Closed),
                _ = async { limiter.lock().await.acquire().await } => {}
            }
        }

        let frame: Frame = self.codec.decode(&data)?;
        Ok(Request::try_from(frame)?)
    }
}

impl<C: Connection> QueueClient for Client<C> {
    fn id(&self) -> ConnectionId {
        self.conn.id()
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
        *self.chat_status.read()
    }

    fn set_chat_status(&self, status: ChatStatus) {
        *self.chat_status.write() = status;
    }

    fn send(&self, response: Response) -> Result<(), ClientError> {
        if self.closed.is_cancelled() {
            return Err(ClientError::Closed);
        }
        match self.outbound.try_send(response) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    steam_id = %self.profile.steam_id,
                    op = %dropped.op(),
                    "outbound queue full, dropping message"
                );
                Err(ClientError::QueueFull(self.profile.steam_id))
            }
            Err(TrySendError::Closed(_)) => Err(ClientError::Closed),
        }
    }

    fn start(&self, shutdown: &CancellationToken) {
        let Some(rx) = self.pending.lock().take() else {
            return;
        };
        let writer = Writer {
            conn: Arc::clone(&self.conn),
            codec: self.codec,
            closed: self.closed.clone(),
            shutdown: shutdown.clone(),
            keepalive: self.keepalive,
            steam_id: self.profile.steam_id,
        };
        tokio::spawn(writer.run(rx));
    }

    fn close(&self) {
        if !self.closed.is_cancelled() {
            tracing::debug!(steam_id = %self.profile.steam_id, "closing client");
        }
        self.closed.cancel();

        // Never started: no writer will close the socket for us.
        if self.pending.lock().take().is_some() {
            let conn = Arc::clone(&self.conn);
            tokio::spawn(async move {
                let _ = conn.close().await;
            });
        }
    }

    fn last_seen(&self) -> Instant {
        let touched = *self.touched.lock();
        match self.conn.last_activity() {
            Some(activity) => activity.max(touched),
            None => touched,
        }
    }
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

struct Writer<C: Connection> {
    conn: Arc<C>,
    codec: JsonCodec,
    closed: CancellationToken,
    shutdown: CancellationToken,
    keepalive: Duration,
    steam_id: SteamId,
}

impl<C: Connection> Writer<C> {
    async fn run(self, mut rx: mpsc::Receiver<Response>) {
        let period = self.keepalive.max(Duration::from_millis(100));
        let start = tokio::time::Instant::now() + period;
        let mut keepalive = tokio::time::interval_at(start, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // `biased` puts queued frames ahead of the shutdown signal, so
            // a shutdown drains the queue (including the goodbye) first.
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                next = rx.recv() => match next {
                    Some(response) => self.write(&response).await,
                    None => break,
                },
                _ = self.shutdown.cancelled() => break,
                _ = keepalive.tick() => {
                    if let Err(e) = self.conn.ping().await {
                        tracing::warn!(steam_id = %self.steam_id, error = %e, "keepalive failed");
                        self.closed.cancel();
                    }
                }
            }
        }

        if let Err(e) = self.conn.close().await {
            tracing::debug!(steam_id = %self.steam_id, error = %e, "close failed");
        }
        tracing::debug!(steam_id = %self.steam_id, "writer stopped");
    }

    async fn write(&self, response: &Response) {
        let bytes = match self.codec.encode(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(steam_id = %self.steam_id, error = %e, "encode failed");
                return;
            }
        };
        if let Err(e) = self.conn.send(&bytes).await {
            tracing::warn!(steam_id = %self.steam_id, error = %e, "write failed");
            // The reader notices and the handler disconnects us.
            self.closed.cancel();
        }
    }
}
