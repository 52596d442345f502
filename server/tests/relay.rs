//! Integration tests running the relay on real sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edit_relay_protocol::{EditAction, EditEvent};
use edit_relay_server::{Connection, ConnectionState, OriginPolicy, ReceiveError, RelayServer, SendError};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async};

const WAIT: Duration = Duration::from_secs(2);

fn sample_event() -> EditEvent {
    EditEvent {
        time: 12345,
        position: 10,
        character: "a".to_string(),
        action: EditAction::Insert,
    }
}

async fn start_relay() -> SocketAddr {
    let server = RelayServer::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    addr
}

/// Accept one raw upgrade and hand back the server-side [`Connection`],
/// for tests that poke at the connection directly.
async fn loopback() -> (
    Arc<Connection>,
    tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        accept_async(stream).await.expect("upgrade")
    });

    let (client, _) = connect_async(format!("ws://{addr}"))
        .await
        .expect("connect");
    let server_side = accept.await.expect("accept task");

    (Arc::new(Connection::new(server_side)), client)
}

#[tokio::test]
async fn echoes_events_byte_for_byte() {
    let addr = start_relay().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.expect("connect");

    let payload = sample_event().encode();
    assert_eq!(payload, r#"{"t":12345,"p":10,"c":"a","a":0}"#);

    ws.send(Message::Text(payload.clone().into()))
        .await
        .expect("send");

    let echoed = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("no echo within deadline")
        .expect("stream ended")
        .expect("read failed");

    match echoed {
        Message::Text(text) => {
            assert_eq!(text.as_str(), payload);
            assert_eq!(EditEvent::decode(text.as_str()).unwrap(), sample_event());
        }
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn survives_malformed_frames() {
    let addr = start_relay().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.expect("connect");

    // An undecodable frame is logged and swallowed; no reply, no close.
    ws.send(Message::Text("not json".into())).await.expect("send");
    ws.send(Message::Text(r#"{"t":1,"p":2,"c":"x","a":9}"#.into()))
        .await
        .expect("send");

    // The next valid event still echoes on the same connection.
    let payload = sample_event().encode();
    ws.send(Message::Text(payload.clone().into()))
        .await
        .expect("send");

    let echoed = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("no echo within deadline")
        .expect("stream ended")
        .expect("read failed");
    assert_eq!(echoed, Message::Text(payload.into()));
}

#[tokio::test]
async fn connections_are_isolated() {
    let addr = start_relay().await;

    let (mut healthy, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
    let (doomed, _) = connect_async(format!("ws://{addr}")).await.expect("connect");

    // Tear the second connection down without a close handshake.
    drop(doomed);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let payload = sample_event().encode();
    healthy
        .send(Message::Text(payload.clone().into()))
        .await
        .expect("send");

    let echoed = tokio::time::timeout(WAIT, healthy.next())
        .await
        .expect("no echo within deadline")
        .expect("stream ended")
        .expect("read failed");
    assert_eq!(echoed, Message::Text(payload.into()));
}

#[tokio::test]
async fn concurrent_sends_never_interleave_frames() {
    let (connection, mut client) = loopback().await;

    let senders = 8;
    let mut tasks = Vec::new();
    for i in 0..senders {
        let connection = Arc::clone(&connection);
        tasks.push(tokio::spawn(async move {
            let frame = format!("frame-{i}-{}", "x".repeat(512));
            connection.send(Message::Text(frame.into())).await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("send");
    }

    let mut seen = Vec::new();
    for _ in 0..senders {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("no frame within deadline")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(text) => seen.push(text.to_string()),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    seen.sort();
    let mut expected: Vec<String> = (0..senders)
        .map(|i| format!("frame-{i}-{}", "x".repeat(512)))
        .collect();
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn close_is_idempotent_and_fails_later_calls() {
    let (connection, _client) = loopback().await;

    assert_eq!(connection.state(), ConnectionState::Open);
    connection.close().await;
    connection.close().await;
    assert_eq!(connection.state(), ConnectionState::Closed);

    let send = connection.send(Message::Text("late".into())).await;
    assert!(matches!(send, Err(SendError::Closed)));

    let receive = connection.receive().await;
    assert!(matches!(receive, Err(ReceiveError::Closed)));
}

#[tokio::test]
async fn receive_times_out_without_closing() {
    let (connection, mut client) = loopback().await;

    let result = connection.receive_timeout(Duration::from_millis(100)).await;
    assert!(matches!(result, Err(ReceiveError::Timeout)));
    assert_eq!(connection.state(), ConnectionState::Open);

    client
        .send(Message::Text("after the timeout".into()))
        .await
        .expect("send");
    let msg = connection
        .receive_timeout(WAIT)
        .await
        .expect("frame after timeout");
    assert_eq!(msg, Message::Text("after the timeout".into()));
}

#[tokio::test]
async fn origin_policy_rejects_disallowed_upgrade() {
    let server = RelayServer::bind("127.0.0.1:0")
        .await
        .expect("bind relay")
        .with_origin_policy(OriginPolicy::AllowList(vec![
            "http://editor.example".to_string(),
        ]));
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());

    let mut denied = format!("ws://{addr}")
        .into_client_request()
        .expect("request");
    denied
        .headers_mut()
        .insert("Origin", "http://evil.example".parse().unwrap());
    assert!(connect_async(denied).await.is_err());

    let mut allowed = format!("ws://{addr}")
        .into_client_request()
        .expect("request");
    allowed
        .headers_mut()
        .insert("Origin", "http://editor.example".parse().unwrap());
    let (mut ws, _) = connect_async(allowed).await.expect("connect");

    let payload = sample_event().encode();
    ws.send(Message::Text(payload.clone().into()))
        .await
        .expect("send");
    let echoed = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("no echo within deadline")
        .expect("stream ended")
        .expect("read failed");
    assert_eq!(echoed, Message::Text(payload.into()));
}
