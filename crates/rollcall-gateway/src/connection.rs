use std::collections::HashSet;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rollcall_types::api::Claims;
use rollcall_types::events::{GatewayCommand, GatewayEvent};
use rollcall_types::models::Role;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_HEARTBEATS: u8 = 2;

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single feed connection: Identify handshake, Ready, then relay
/// check-ins for the subscribed events until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let Some(claims) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("Feed client failed to identify, closing");
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    let ready = GatewayEvent::Ready {
        user_id: claims.sub,
        name: claims.name.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let open = dispatcher.connection_opened();
    info!("{} ({}) joined the check-in feed ({} connected)", claims.name, claims.sub, open);

    run_connection_loop(sender, receiver, &dispatcher, &claims).await;

    let remaining = dispatcher.connection_closed();
    info!("{} ({}) left the check-in feed ({} connected)", claims.name, claims.sub, remaining);
}

/// Decode a feed token. Only staff may watch the door.
pub fn authorize_feed_token(token: &str, jwt_secret: &str) -> Option<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    match token_data.claims.role {
        Role::Organizer | Role::Admin => Some(token_data.claims),
        Role::Student => None,
    }
}

/// Whether a connection with `subscriptions` should see `event`.
pub fn should_forward(event: &GatewayEvent, subscriptions: &HashSet<Uuid>) -> bool {
    match event.event_id() {
        Some(event_id) => subscriptions.contains(&event_id),
        None => true,
    }
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: &Dispatcher,
    claims: &Claims,
) {
    let mut broadcast_rx = dispatcher.subscribe();
    let mut subscriptions: HashSet<Uuid> = HashSet::new();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                let event = match result {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        warn!("Feed receiver for {} lagged by {} events", claims.sub, n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if !should_forward(&event, &subscriptions) {
                    continue;
                }
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GatewayCommand>(text.as_str()) {
                            Ok(GatewayCommand::Subscribe { event_ids }) => {
                                debug!("{} watching {} events", claims.sub, event_ids.len());
                                subscriptions = event_ids.into_iter().collect();
                            }
                            // Already identified
                            Ok(GatewayCommand::Identify { .. }) => {}
                            Err(e) => {
                                let preview: String = text.as_str().chars().take(200).collect();
                                warn!("{} bad feed command: {} -- raw: {}", claims.sub, e, preview);
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => pong_received = true,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if std::mem::replace(&mut pong_received, false) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= MAX_MISSED_HEARTBEATS {
                        warn!("Heartbeat timeout for {} (missed {} pongs), dropping feed", claims.sub, missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Claims> {
    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(text.as_str())
                {
                    return authorize_feed_token(&token, jwt_secret);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode feed event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
