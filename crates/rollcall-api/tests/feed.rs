mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use rollcall_types::events::GatewayEvent;

use common::TestApp;

type Feed = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Time for the server to apply a Subscribe before we broadcast.
const SETTLE: Duration = Duration::from_millis(200);

async fn connect(addr: SocketAddr) -> Feed {
    let (ws, _) = connect_async(format!("ws://{addr}/gateway")).await.unwrap();
    ws
}

async fn send(ws: &mut Feed, command: Value) {
    ws.send(Message::Text(command.to_string().into())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut Feed) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("feed went quiet")
            .expect("feed closed")
            .unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

/// Asserts the server closes the socket within `within`.
async fn expect_closed(ws: &mut Feed, within: Duration) {
    let next = tokio::time::timeout(within, ws.next())
        .await
        .expect("server kept the socket open");
    match next {
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {}
        Some(Ok(other)) => panic!("expected close, got {other:?}"),
    }
}

fn check_in(event_id: Uuid) -> GatewayEvent {
    GatewayEvent::CheckIn {
        event_id,
        registration_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        attendee_name: "Ada".into(),
        checked_in_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn identified_organizer_receives_only_subscribed_check_ins() {
    let app = TestApp::new().await;
    let (organizer_id, organizer) = app.organizer("Olivia").await;
    let addr = app.serve().await;

    let mut ws = connect(addr).await;
    send(&mut ws, json!({ "type": "Identify", "data": { "token": organizer } })).await;

    let ready = next_json(&mut ws).await;
    assert_eq!(ready["type"], "Ready");
    assert_eq!(ready["data"]["user_id"], organizer_id.to_string());
    assert_eq!(ready["data"]["name"], "Olivia");

    let watched = Uuid::new_v4();
    let other = Uuid::new_v4();

    send(&mut ws, json!({ "type": "Subscribe", "data": { "event_ids": [watched] } })).await;
    tokio::time::sleep(SETTLE).await;
    app.state.dispatcher.broadcast(check_in(other));
    app.state.dispatcher.broadcast(check_in(watched));

    let delivered = next_json(&mut ws).await;
    assert_eq!(delivered["type"], "CheckIn");
    assert_eq!(delivered["data"]["event_id"], watched.to_string());

    // A new Subscribe replaces the set rather than extending it
    send(&mut ws, json!({ "type": "Subscribe", "data": { "event_ids": [other] } })).await;
    tokio::time::sleep(SETTLE).await;
    app.state.dispatcher.broadcast(check_in(watched));
    app.state.dispatcher.broadcast(check_in(other));

    let delivered = next_json(&mut ws).await;
    assert_eq!(delivered["data"]["event_id"], other.to_string());
}

#[tokio::test]
async fn student_tokens_are_refused() {
    let app = TestApp::new().await;
    let (_, student) = app.student("Ada").await;
    let addr = app.serve().await;

    let mut ws = connect(addr).await;
    send(&mut ws, json!({ "type": "Identify", "data": { "token": student } })).await;
    expect_closed(&mut ws, Duration::from_secs(5)).await;
    assert_eq!(app.state.dispatcher.connected(), 0);
}

#[tokio::test]
async fn silent_clients_are_dropped_after_identify_timeout() {
    let app = TestApp::new().await;
    let addr = app.serve().await;

    let mut ws = connect(addr).await;
    expect_closed(&mut ws, Duration::from_secs(15)).await;
}
