use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use penlink_net::{
    ConnectionConfig, ConnectionManager, ConnectionNotification, ConnectionState, Endpoints,
    ReconnectPolicy,
};
use penlink_shared::protocol::{InboundEvent, OutboundFrame};
use penlink_shared::types::{ConversationId, UserId};

const WAIT: Duration = Duration::from_secs(5);

struct Accepted {
    path: String,
    ws: WebSocketStream<TcpStream>,
}

async fn start_server() -> (String, mpsc::UnboundedReceiver<Accepted>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut path = String::new();
                let callback =
                    |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        path = req.uri().path().to_string();
                        Ok(resp)
                    };
                let handshake = tokio_tungstenite::accept_hdr_async(stream, callback).await;
                if let Ok(ws) = handshake {
                    let _ = tx.send(Accepted { path, ws });
                }
            });
        }
    });

    (format!("http://{addr}"), rx)
}

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        heartbeat: Duration::from_secs(30),
        reconnect: ReconnectPolicy::new(Duration::from_millis(50), Duration::from_millis(50)),
    }
}

fn manager(
    backend: &str,
    config: ConnectionConfig,
) -> (ConnectionManager, mpsc::Receiver<ConnectionNotification>) {
    ConnectionManager::new(Endpoints::from_backend_url(backend).unwrap(), config)
}

async fn next(rx: &mut mpsc::Receiver<ConnectionNotification>) -> ConnectionNotification {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}

/// Skip dial notifications until the link is open.
async fn wait_connected(rx: &mut mpsc::Receiver<ConnectionNotification>) {
    loop {
        match next(rx).await {
            ConnectionNotification::Connected => return,
            ConnectionNotification::Connecting { .. } => continue,
            other => panic!("unexpected notification before connect: {other:?}"),
        }
    }
}

async fn accept(server: &mut mpsc::UnboundedReceiver<Accepted>) -> Accepted {
    timeout(WAIT, server.recv())
        .await
        .expect("timed out waiting for a client")
        .expect("server stopped")
}

async fn read_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client hung up")
            .expect("read failed");
        if let WsMessage::Text(text) = frame {
            return text;
        }
    }
}

#[tokio::test]
async fn delivers_events_and_drops_heartbeat_replies_and_garbage() {
    let (backend, mut server) = start_server().await;
    let (mut mgr, mut rx) = manager(&backend, fast_config());

    assert!(mgr.connect(&UserId::from("u1")));
    let mut conn = accept(&mut server).await;
    assert_eq!(conn.path, "/ws/notifications/u1");
    wait_connected(&mut rx).await;
    assert!(mgr.is_open());

    for text in [
        "pong",
        r#"{"type":"pong"}"#,
        "{not json",
        r#"{"type":"user_status","user_id":"u2","online":true,"last_seen":"2024-05-01T10:00:00Z"}"#,
    ] {
        conn.ws.send(WsMessage::Text(text.to_string())).await.unwrap();
    }

    match next(&mut rx).await {
        ConnectionNotification::Event(InboundEvent::UserStatus { user_id, online, .. }) => {
            assert_eq!(user_id, UserId::from("u2"));
            assert!(online);
        }
        other => panic!("expected user_status event, got {other:?}"),
    }

    mgr.disconnect().await;
}

#[tokio::test]
async fn sends_heartbeat_and_typing_frames() {
    let (backend, mut server) = start_server().await;
    let config = ConnectionConfig {
        heartbeat: Duration::from_millis(100),
        ..fast_config()
    };
    let (mut mgr, mut rx) = manager(&backend, config);

    mgr.connect(&UserId::from("u1"));
    let mut conn = accept(&mut server).await;
    wait_connected(&mut rx).await;

    assert_eq!(read_text(&mut conn.ws).await, "ping");

    mgr.send(OutboundFrame::Typing {
        conversation_id: ConversationId::from("C1"),
        typing: true,
    })
    .await
    .unwrap();

    let typing = loop {
        let text = read_text(&mut conn.ws).await;
        if text != "ping" {
            break text;
        }
    };
    let value: serde_json::Value = serde_json::from_str(&typing).unwrap();
    assert_eq!(value["type"], "typing");
    assert_eq!(value["conversation_id"], "C1");
    assert_eq!(value["typing"], true);

    mgr.disconnect().await;
}

#[tokio::test]
async fn connect_is_a_noop_while_a_channel_exists() {
    let (backend, mut server) = start_server().await;
    let (mut mgr, mut rx) = manager(&backend, fast_config());
    let user = UserId::from("u1");

    assert!(mgr.connect(&user));
    assert!(!mgr.connect(&user));
    let _conn = accept(&mut server).await;
    wait_connected(&mut rx).await;
    assert!(!mgr.connect(&user));

    assert!(
        timeout(Duration::from_millis(300), server.recv()).await.is_err(),
        "a second socket was opened"
    );

    mgr.disconnect().await;
}

#[tokio::test]
async fn reconnects_with_jitter_after_unexpected_close() {
    let (backend, mut server) = start_server().await;
    let config = fast_config();
    let (min, max) = config.reconnect.bounds();
    let (mut mgr, mut rx) = manager(&backend, config);

    mgr.connect(&UserId::from("u1"));
    let mut first = accept(&mut server).await;
    wait_connected(&mut rx).await;

    first.ws.close(None).await.unwrap();

    assert_eq!(
        next(&mut rx).await,
        ConnectionNotification::Disconnected { intentional: false }
    );
    match next(&mut rx).await {
        ConnectionNotification::ReconnectScheduled { delay } => {
            assert!(delay >= min && delay <= max, "delay {delay:?} out of range");
        }
        other => panic!("expected reconnect, got {other:?}"),
    }

    let second = accept(&mut server).await;
    assert_eq!(second.path, "/ws/notifications/u1");
    wait_connected(&mut rx).await;

    mgr.disconnect().await;
}

#[tokio::test]
async fn intentional_disconnect_never_reconnects() {
    let (backend, mut server) = start_server().await;
    let (mut mgr, mut rx) = manager(&backend, fast_config());

    mgr.connect(&UserId::from("u1"));
    let _conn = accept(&mut server).await;
    wait_connected(&mut rx).await;

    mgr.disconnect().await;
    assert_eq!(mgr.state(), ConnectionState::Closed);
    assert_eq!(
        next(&mut rx).await,
        ConnectionNotification::Disconnected { intentional: true }
    );

    assert!(
        timeout(Duration::from_millis(300), server.recv()).await.is_err(),
        "client redialed after disconnect"
    );
    assert!(rx.try_recv().is_err());
    assert!(mgr.send(OutboundFrame::Heartbeat).await.is_err());
}

#[tokio::test]
async fn hidden_client_defers_reconnect_until_visible() {
    let (backend, mut server) = start_server().await;
    let (mut mgr, mut rx) = manager(&backend, fast_config());

    mgr.connect(&UserId::from("u1"));
    let mut conn = accept(&mut server).await;
    wait_connected(&mut rx).await;

    mgr.set_visible(false).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    conn.ws.close(None).await.unwrap();

    assert_eq!(
        next(&mut rx).await,
        ConnectionNotification::Disconnected { intentional: false }
    );
    assert!(
        timeout(Duration::from_millis(300), rx.recv()).await.is_err(),
        "reconnect scheduled while hidden"
    );
    assert_eq!(mgr.state(), ConnectionState::Backoff);

    mgr.set_visible(true).await;
    assert!(matches!(
        next(&mut rx).await,
        ConnectionNotification::ReconnectScheduled { .. }
    ));
    let _again = accept(&mut server).await;
    wait_connected(&mut rx).await;

    mgr.disconnect().await;
}
