//! Integration tests for `Client` over an in-memory connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use playerqueue_client::{Client, ClientConfig, ClientError, Profile, QueueClient};
use playerqueue_protocol::{
    ByePayload, ChatStatus, PurgePayload, Request, Response, SteamId,
};
use playerqueue_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static NEXT_CONN: AtomicU64 = AtomicU64::new(1);

/// A connection whose peer is a pair of channels held by the test.
struct MockConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

struct Peer {
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl Peer {
    fn say(&self, raw: &str) {
        self.to_client.send(raw.as_bytes().to_vec()).unwrap();
    }

    async fn hear(&mut self) -> Response {
        let bytes = tokio::time::timeout(Duration::from_secs(5), self.from_client.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection dropped");
        serde_json::from_slice(&bytes).unwrap()
    }
}

fn mock() -> (MockConnection, Peer) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let conn = MockConnection {
        id: ConnectionId::new(NEXT_CONN.fetch_add(1, Ordering::Relaxed)),
        inbound: Mutex::new(inbound),
        outbound,
        closed: Arc::clone(&closed),
    };
    (conn, Peer { to_client, from_client, closed })
}

impl Connection for MockConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

fn profile(account: u32) -> Profile {
    Profile::new(SteamId::from_account(account), format!("player-{account}"))
}

fn unlimited() -> ClientConfig {
    ClientConfig {
        rate_limit_burst: 0,
        ..ClientConfig::default()
    }
}

fn bye(text: &str) -> Response {
    Response::Bye(ByePayload {
        message: text.into(),
    })
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_next_valid_frame_returns_request() {
    let (conn, peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());

    peer.say(r#"{"op":0,"payload":{"servers":[3]}}"#);
    let req = client.next().await.unwrap();
    assert!(matches!(req, Request::JoinQueue(p) if p.servers.len() == 1));
}

#[tokio::test]
async fn test_next_peer_hangup_returns_closed() {
    let (conn, peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());

    drop(peer);
    let err = client.next().await.unwrap_err();
    assert!(matches!(err, ClientError::Closed));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_next_garbage_returns_protocol_error_and_keeps_reading() {
    let (conn, peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());

    peer.say("{not json");
    peer.say(r#"{"op":99,"payload":{}}"#);
    peer.say(r#"{"op":1,"payload":{"servers":[]}}"#);

    let first = client.next().await.unwrap_err();
    assert!(matches!(first, ClientError::Protocol(_)));
    assert!(!first.is_fatal());
    assert!(matches!(
        client.next().await.unwrap_err(),
        ClientError::Protocol(_)
    ));
    assert!(matches!(
        client.next().await.unwrap(),
        Request::LeaveQueue(_)
    ));
}

#[tokio::test]
async fn test_next_after_close_returns_closed() {
    let (conn, _peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());

    client.close();
    assert!(matches!(client.next().await, Err(ClientError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn test_next_rate_limited_waits_for_token() {
    let (conn, peer) = mock();
    let config = ClientConfig {
        rate_limit_burst: 1,
        rate_limit_refill: Duration::from_secs(5),
        ..ClientConfig::default()
    };
    let client = Client::new(conn, profile(1), &config);
    let start = tokio::time::Instant::now();

    peer.say(r#"{"op":2,"payload":{"body_md":"one"}}"#);
    peer.say(r#"{"op":2,"payload":{"body_md":"two"}}"#);

    client.next().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    client.next().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(5));
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_delivers_in_enqueue_order() {
    let (conn, mut peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());
    client.start(&CancellationToken::new());

    for i in 0..10 {
        client
            .send(Response::Purge(PurgePayload {
                message_ids: vec![i],
            }))
            .unwrap();
    }
    for i in 0..10 {
        match peer.hear().await {
            Response::Purge(p) => assert_eq!(p.message_ids, vec![i]),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_send_before_start_is_queued() {
    let (conn, mut peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());

    client.send(bye("early")).unwrap();
    client.start(&CancellationToken::new());

    assert_eq!(peer.hear().await, bye("early"));
}

#[tokio::test]
async fn test_send_full_queue_drops_newest() {
    let (conn, mut peer) = mock();
    let config = ClientConfig {
        outbound_capacity: 2,
        ..unlimited()
    };
    let client = Client::new(conn, profile(1), &config);

    client.send(bye("a")).unwrap();
    client.send(bye("b")).unwrap();
    let err = client.send(bye("c")).unwrap_err();
    assert!(matches!(err, ClientError::QueueFull(_)));

    client.start(&CancellationToken::new());
    assert_eq!(peer.hear().await, bye("a"));
    assert_eq!(peer.hear().await, bye("b"));
}

#[tokio::test]
async fn test_close_closes_connection_and_rejects_sends() {
    let (conn, peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());
    client.start(&CancellationToken::new());

    client.close();
    client.close();

    for _ in 0..50 {
        if peer.closed.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(peer.closed.load(Ordering::SeqCst));
    assert!(matches!(client.send(bye("late")), Err(ClientError::Closed)));
}

#[tokio::test]
async fn test_shutdown_drains_queue_then_closes() {
    let (conn, mut peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());
    let shutdown = CancellationToken::new();

    client.send(bye("first")).unwrap();
    client.send(bye("second")).unwrap();
    shutdown.cancel();
    client.start(&shutdown);

    assert_eq!(peer.hear().await, bye("first"));
    assert_eq!(peer.hear().await, bye("second"));
    for _ in 0..50 {
        if peer.closed.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(peer.closed.load(Ordering::SeqCst));
}

// ---------------------------------------------------------------------------
// Identity and status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_status_update_changes_message_access() {
    let (conn, _peer) = mock();
    let client = Client::new(conn, profile(7), &unlimited());

    assert_eq!(client.steam_id(), SteamId::from_account(7));
    assert_eq!(client.member().name, "player-7");
    assert!(client.has_message_access());

    client.set_chat_status(ChatStatus::Noaccess);
    assert_eq!(client.chat_status(), ChatStatus::Noaccess);
    assert!(!client.has_message_access());
}

#[tokio::test]
async fn test_last_seen_advances_on_inbound_frame() {
    let (conn, peer) = mock();
    let client = Client::new(conn, profile(1), &unlimited());
    let before = client.last_seen();

    tokio::time::sleep(Duration::from_millis(5)).await;
    peer.say(r#"{"op":1,"payload":{"servers":[]}}"#);
    client.next().await.unwrap();

    assert!(client.last_seen() > before);
}
