//! WebSocket streaming of row changes.
//!
//! Clients subscribe to feed tables and are told when a row changed, so they
//! can refetch. Row contents are never pushed.

#![allow(missing_docs)]

use std::collections::HashMap;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use fun_core::{ChangeEvent, ChangeTable};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::middleware::AppState;

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for authentication.
    #[serde(rename = "i")]
    pub token: Option<String>,
}

/// Client-to-server message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Watch a table under a client-chosen subscription ID.
    Subscribe { id: String, table: ChangeTable },
    /// Stop watching.
    Unsubscribe { id: String },
}

/// Server-to-client message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Subscription registered.
    Subscribed { id: String },
    /// A watched table changed.
    Changed { id: String, event: ChangeEvent },
    /// Client message could not be handled.
    Error { message: String },
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_id = query
        .token
        .as_deref()
        .and_then(|token| state.verifier.verify(token))
        .and_then(|session| session.user_id().map(str::to_string));

    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: Option<String>, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut changes = state.changes.subscribe();
    let mut subscriptions: HashMap<String, ChangeTable> = HashMap::new();

    info!(user_id = ?user_id, "Streaming connection established");

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handle_client_message(client_msg, &mut subscriptions),
                            Err(e) => {
                                warn!(error = %e, "Failed to parse client message");
                                Some(ServerMessage::Error { message: e.to_string() })
                            }
                        };
                        if let Some(reply) = reply
                            && !send(&mut sender, &reply).await
                        {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            change = changes.recv() => {
                let event = match change {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Streaming client lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let mut open = true;
                for message in fan_out(&subscriptions, &event) {
                    if !send(&mut sender, &message).await {
                        open = false;
                        break;
                    }
                }
                if !open {
                    break;
                }
            }
        }
    }

    info!(user_id = ?user_id, "Streaming connection closed");
}

async fn send<S>(sender: &mut S, message: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    let Ok(json) = serde_json::to_string(message) else {
        return true;
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

fn handle_client_message(
    msg: ClientMessage,
    subscriptions: &mut HashMap<String, ChangeTable>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Subscribe { id, table } => {
            subscriptions.insert(id.clone(), table);
            debug!(id = %id, table = %table, "Table subscribed");
            Some(ServerMessage::Subscribed { id })
        }
        ClientMessage::Unsubscribe { id } => {
            subscriptions.remove(&id);
            debug!(id = %id, "Table unsubscribed");
            None
        }
    }
}

/// One message per subscription watching the event's table.
fn fan_out(subscriptions: &HashMap<String, ChangeTable>, event: &ChangeEvent) -> Vec<ServerMessage> {
    let mut ids: Vec<&String> = subscriptions
        .iter()
        .filter(|(_, table)| **table == event.table)
        .map(|(id, _)| id)
        .collect();
    ids.sort();

    ids.into_iter()
        .map(|id| ServerMessage::Changed {
            id: id.clone(),
            event: event.clone(),
        })
        .collect()
}
