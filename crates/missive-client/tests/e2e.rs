//! End-to-end flow against a mock REST backend and a real WebSocket echo
//! peer: sign in, open a conversation, send optimistically, and watch the
//! echoed confirmation replace the pending entry.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use missive_client::{Client, ClientConfig, ClientEvent};
use missive_shared::{ConnectionState, UserId};

/// Accept one WebSocket connection and echo every text frame back.
async fn spawn_echo_server() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                WsMessage::Text(text) => {
                    if ws.send(WsMessage::Text(text)).await.is_err() {
                        break;
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    Url::parse(&format!("ws://{addr}")).unwrap()
}

async fn next_matching<F>(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<ClientEvent>,
    mut predicate: F,
) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream ended");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn optimistic_send_is_confirmed_by_the_echo() {
    let rest = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-1",
            "user": { "id": "u1", "email": "a@b.c", "displayName": "Alice" },
        })))
        .mount(&rest)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "c1", "email": "bob@example.com", "displayName": "Bob" },
        ])))
        .mount(&rest)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "m1", "fromId": "c1", "toId": "u1", "content": "earlier" },
        ])))
        .mount(&rest)
        .await;

    let socket_url = spawn_echo_server().await;
    let data_dir = tempfile::tempdir().unwrap();
    let (client, mut events) = Client::new(ClientConfig {
        api_url: Url::parse(&rest.uri()).unwrap(),
        socket_url,
        data_dir: data_dir.path().to_path_buf(),
    });

    client.login("a@b.c", "pw").await.unwrap();
    next_matching(&mut events, |e| {
        matches!(
            e,
            ClientEvent::ConnectionChanged {
                state: ConnectionState::Connected
            }
        )
    })
    .await;

    client.open_conversation(&UserId::new("c1")).await.unwrap();
    assert_eq!(client.conversation_entries().len(), 1);

    client.send_message(Some("hello bob".to_string()), None).unwrap();
    match next_matching(&mut events, |e| matches!(e, ClientEvent::MessagePending { .. })).await {
        ClientEvent::MessagePending { message } => {
            assert_eq!(message.content.as_deref(), Some("hello bob"));
            assert_eq!(message.from, UserId::new("u1"));
        }
        _ => unreachable!(),
    }

    // The echo comes back as a confirmed message and replaces the pending
    // entry rather than duplicating it.
    match next_matching(&mut events, |e| matches!(e, ClientEvent::MessageReceived { .. })).await {
        ClientEvent::MessageReceived { message, reconciled } => {
            assert!(reconciled);
            assert_eq!(message.content.as_deref(), Some("hello bob"));
        }
        _ => unreachable!(),
    }

    let entries = client.conversation_entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| !e.pending));
    assert_eq!(entries[1].message.content.as_deref(), Some("hello bob"));

    client.logout();
}
