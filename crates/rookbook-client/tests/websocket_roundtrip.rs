//! End-to-end test against a minimal in-process book server.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rookbook_client::{
    ActorError, ClientConfig, ClientError, ClientEvent, ClientMessage, ClientState, Transport, TransportError,
    WebSocketTransport, connect_websocket, spawn_client,
};
use rookbook_overlay::{Epoch, Path};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

/// Accept one client, push a document and a table, ack every `set`, and
/// hang up after the first `action`. Returns every frame the client sent.
async fn serve_one(listener: TcpListener) -> Vec<Value> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();
    let mut rows = json!([{"_id": 5, "name": "Alice"}]);

    let push = |value: Value| Message::Text(value.to_string());
    ws.send(push(json!({"type": "document", "data": "<rookbook><table id=\"t1\"/></rookbook>"})))
        .await
        .unwrap();
    ws.send(push(json!({"type": "data", "id": "t1", "data": rows, "header": {"columns": [
        ["name", {"type_node": "<string/>"}]
    ]}})))
    .await
    .unwrap();

    let mut received = Vec::new();
    while let Some(Ok(frame)) = ws.next().await {
        let Message::Text(text) = frame else { continue };
        let msg: Value = serde_json::from_str(&text).unwrap();
        received.push(msg.clone());
        match msg["type"].as_str() {
            Some("set") => {
                assert_eq!(msg["path"], json!(["t1", "5", "name"]));
                rows[0]["name"] = msg["value"].clone();
                ws.send(push(json!({"type": "data", "id": "t1", "data": rows, "header": null})))
                    .await
                    .unwrap();
                ws.send(push(json!({"type": "set-done", "epoch": msg["epoch"]}))).await.unwrap();
            }
            Some("action") => {
                ws.send(push(json!({"type": "presence", "who": "carol"}))).await.unwrap();
                ws.send(Message::Text("{not json".into())).await.unwrap();
                ws.close(None).await.unwrap();
                break;
            }
            _ => {}
        }
    }
    received
}

#[tokio::test]
async fn test_edit_ack_and_disconnect_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_one(listener));

    let config = ClientConfig { url: format!("ws://{addr}/websocket"), ..ClientConfig::default() };
    let client = connect_websocket(&config).await.unwrap();
    let cell_path = Path::from(["t1", "5", "name"]);

    let mut state_rx = client.subscribe_state();
    timeout(WAIT, state_rx.wait_for(|s| s.confirmed("t1").is_some())).await.unwrap().unwrap();
    assert_eq!(client.field(&cell_path).unwrap().value(&Value::Null), &json!("Alice"));

    let epoch = client.submit_edit_confirmed(cell_path.clone(), json!("Bob")).await.unwrap();
    assert_eq!(epoch, Epoch(0));
    // Optimistic read before the server answers.
    assert_eq!(client.latest().read_field(&cell_path, &Value::Null).unwrap(), &json!("Bob"));

    timeout(WAIT, state_rx.wait_for(|s| s.pending().is_empty())).await.unwrap().unwrap();
    let state = client.snapshot().await.unwrap();
    assert_eq!(state.confirmed_value(&cell_path), Some(&json!("Bob")));

    let mut events = client.subscribe_events();
    client.submit_action(Path::from(["t1"]), json!({"type": "delete", "id": 5})).unwrap();

    let mut saw_unknown = false;
    loop {
        match timeout(WAIT, events.recv()).await.unwrap().unwrap() {
            ClientEvent::Ignored { kind } => {
                assert_eq!(kind, "presence");
                saw_unknown = true;
            }
            ClientEvent::Disconnected { .. } => break,
            _ => {}
        }
    }
    assert!(saw_unknown);

    let received = timeout(WAIT, server).await.unwrap().unwrap();
    let kinds: Vec<_> = received.iter().map(|m| m["type"].as_str().unwrap().to_string()).collect();
    assert_eq!(kinds, ["set", "action"]);
    assert_eq!(received[0]["epoch"], json!(0));
}

#[tokio::test]
async fn test_attach_after_server_hangup_rejects_edits() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
        // Drain until the client answers the close.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = spawn_client(ClientState::new());
    let mut events = client.subscribe_events();
    let transport = WebSocketTransport::connect(&format!("ws://{addr}/websocket"), client.clone())
        .await
        .unwrap();

    match timeout(WAIT, events.recv()).await.unwrap().unwrap() {
        ClientEvent::Disconnected { .. } => {}
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert!(transport.is_closed());
    let msg = ClientMessage::Action { path: Path::from(["a"]), value: json!(1) };
    assert!(matches!(transport.send(&msg), Err(TransportError::Closed)));

    client.attach(Arc::new(transport)).unwrap();
    let err = client.submit_edit_confirmed(Path::from(["a"]), json!(1)).await.unwrap_err();
    assert!(matches!(err, ActorError::Client(ClientError::NotConnected)));

    let state = client.snapshot().await.unwrap();
    assert!(!state.connection().is_attached());
    assert!(state.pending().is_empty());
    assert_eq!(state.next_epoch(), Epoch(0));

    timeout(WAIT, server).await.unwrap().unwrap();
}
