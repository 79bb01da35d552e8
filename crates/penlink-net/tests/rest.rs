use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use penlink_net::{ApiClient, Endpoints, NetError};
use penlink_shared::models::MessageDraft;
use penlink_shared::types::{ConversationId, UserId};

/// A received HTTP request, split into head and body.
struct Captured {
    head: String,
    body: String,
}

/// Serve exactly one canned response and hand back the request it answered.
async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let head_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while buf.len() < head_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let req_body = String::from_utf8_lossy(&buf[head_end..]).to_string();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();

        let _ = tx.send(Captured {
            head,
            body: req_body,
        });
    });

    (format!("http://{addr}"), rx)
}

fn client(backend: &str) -> ApiClient {
    ApiClient::new(Endpoints::from_backend_url(backend).unwrap()).with_token("tok-123")
}

#[tokio::test]
async fn list_conversations_uses_bearer_token() {
    let (backend, captured) = serve_once(
        "200 OK",
        r#"[{"id":"C123","participants":["u1","u2"],
            "participant_details":[{"user_id":"u2","username":"bob","avatar":""}],
            "last_message":"hi","last_message_at":"2024-05-01T10:00:00Z",
            "unread_count":{"u1":2},
            "created_at":"2024-04-01T10:00:00Z","updated_at":"2024-05-01T10:00:00Z"}]"#,
    )
    .await;

    let conversations = client(&backend).list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].unread_for(&UserId::from("u1")), 2);

    let req = captured.await.unwrap();
    assert!(req.head.starts_with("GET /api/conversations HTTP/1.1"));
    assert!(req
        .head
        .to_ascii_lowercase()
        .contains("authorization: bearer tok-123"));
}

#[tokio::test]
async fn send_message_posts_flattened_draft() {
    let (backend, captured) = serve_once(
        "200 OK",
        r#"{"id":"m1","conversation_id":"C123","sender_id":"u1","content":"hi",
            "read_by":["u1"],"delivered_to":["u1"],"created_at":"2024-05-01T10:00:00Z"}"#,
    )
    .await;

    let msg = client(&backend)
        .send_message(&ConversationId::from("C123"), &MessageDraft::text("hi"))
        .await
        .unwrap();
    assert_eq!(msg.id.as_str(), "m1");

    let req = captured.await.unwrap();
    assert!(req.head.starts_with("POST /api/messages HTTP/1.1"));
    let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"conversation_id": "C123", "content": "hi", "type": "text"})
    );
}

#[tokio::test]
async fn non_success_status_is_an_http_error() {
    let (backend, _captured) =
        serve_once("404 Not Found", r#"{"detail":"Conversation not found"}"#).await;

    let err = client(&backend)
        .mark_conversation_read(&ConversationId::from("nope"))
        .await
        .unwrap_err();
    match err {
        NetError::Http { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("Conversation not found"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn unread_count_reads_count_field() {
    let (backend, _captured) = serve_once("200 OK", r#"{"count":7}"#).await;
    assert_eq!(client(&backend).unread_notification_count().await.unwrap(), 7);
}

#[tokio::test]
async fn unread_count_reads_backend_field_name() {
    let (backend, captured) = serve_once("200 OK", r#"{"unread_count":7}"#).await;
    assert_eq!(client(&backend).unread_notification_count().await.unwrap(), 7);

    let req = captured.await.unwrap();
    assert!(req.head.starts_with("GET /api/notifications/unread-count "));
}

#[tokio::test]
async fn missing_token_fails_without_a_request() {
    let api = ApiClient::new(Endpoints::from_backend_url("http://127.0.0.1:9").unwrap());
    let err = api.notifications().await.unwrap_err();
    assert!(matches!(err, NetError::MissingToken));
    assert!(err.is_unauthorized());
}
