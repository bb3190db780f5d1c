//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real WebSocket listener on an OS-assigned port
//! and drive it with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use playerqueue_transport::{
        Connection, Transport, TransportError, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn connect_client(url: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&format!("ws://{addr}/ws")).await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);

        // Server sends text JSON, client receives it as a text frame.
        server_conn
            .send(br#"{"op":6}"#)
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), br#"{"op":6}"#);

        client_ws
            .send(Message::Text(r#"{"op":0}"#.into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, br#"{"op":0}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&format!("ws://{addr}")).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_accept_captures_token_query_parameter() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let _client =
            connect_client(&format!("ws://{addr}/ws?token=76561198000000001"))
                .await;
        let server_conn = server_handle.await.unwrap();

        assert_eq!(server_conn.token(), Some("76561198000000001"));
    }

    #[tokio::test]
    async fn test_accept_without_token_yields_none() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let _client = connect_client(&format!("ws://{addr}/ws")).await;
        let server_conn = server_handle.await.unwrap();

        assert!(server_conn.token().is_none());
    }

    #[tokio::test]
    async fn test_accept_disallowed_origin_is_rejected() {
        let (transport, addr) = bind().await;
        let mut transport = transport
            .with_allowed_origins(vec!["https://queue.example".into()]);

        let server_handle =
            tokio::spawn(async move { transport.accept().await });

        let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
        request.headers_mut().insert(
            "Origin",
            HeaderValue::from_static("https://elsewhere.example"),
        );
        let client = tokio_tungstenite::connect_async(request).await;
        assert!(client.is_err(), "client upgrade should be refused");

        let result = server_handle.await.unwrap();
        assert!(matches!(result, Err(TransportError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_recv_refreshes_last_activity() {
        let (mut transport, addr) = bind().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&format!("ws://{addr}")).await;
        let server_conn = server_handle.await.unwrap();

        let before = server_conn.last_activity().expect("tracked");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client_ws.send(Message::Text("{}".into())).await.unwrap();
        server_conn.recv().await.unwrap();

        let after = server_conn.last_activity().expect("tracked");
        assert!(after > before);
    }
}
