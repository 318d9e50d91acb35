//! # Realtime Channel
//!
//! One persistent WebSocket per client at `/realtime`. The client sends
//! subscribe/unsubscribe frames naming a collection and optional filter;
//! the server pushes event frames for committed mutations the subscriber's
//! own view rule admits, and a gap frame whenever buffered events were
//! dropped for that subscriber.
//!
//! Identity is captured once at upgrade (bearer header or `token` query
//! parameter); the view rule itself is re-read at every publish, so rule
//! edits apply to live subscriptions immediately.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::Identity;
use crate::events::{BusMessage, EventKind};
use crate::observability::{log, Severity};
use crate::rules::parse_filter;

use super::state::AppState;

/// Routes under `/realtime`.
pub fn realtime_routes() -> Router<Arc<AppState>> {
    Router::new().route("/realtime", get(realtime_handler))
}

/// Frames the client sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe {
        collection: String,
        #[serde(default)]
        filter: Option<String>,
    },
    Unsubscribe {
        collection: String,
    },
}

/// Frames the server pushes.
#[derive(Debug, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
enum ServerFrame {
    Subscribed {
        collection: String,
    },
    Unsubscribed {
        collection: String,
    },
    Event {
        event: EventKind,
        collection: String,
        record: Value,
    },
    Gap {
        collection: String,
    },
    Error {
        detail: String,
    },
}

async fn realtime_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let identity = state
        .identity_from_token(params.get("token").map(String::as_str))
        .or_else(|| state.identity_from_headers(&headers));

    ws.on_upgrade(move |socket| handle_connection(socket, state, identity))
}

struct ActiveSubscription {
    id: String,
    forwarder: JoinHandle<()>,
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>, identity: Option<Identity>) {
    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let mut subscriptions: HashMap<String, ActiveSubscription> = HashMap::new();

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                let Ok(text) = serde_json::to_string(&frame) else { continue };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, &identity, &tx, &mut subscriptions, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Disconnect releases every per-subscriber buffer immediately.
    for (_, subscription) in subscriptions {
        let _ = state.bus.unsubscribe(&subscription.id);
        subscription.forwarder.abort();
    }
}

fn handle_client_frame(
    state: &Arc<AppState>,
    identity: &Option<Identity>,
    tx: &mpsc::UnboundedSender<ServerFrame>,
    subscriptions: &mut HashMap<String, ActiveSubscription>,
    text: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            let _ = tx.send(ServerFrame::Error {
                detail: format!("malformed frame: {}", e),
            });
            return;
        }
    };

    match frame {
        ClientFrame::Subscribe { collection, filter } => {
            let parsed_filter = match filter.as_deref() {
                Some(source) => match parse_filter(source) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        let _ = tx.send(ServerFrame::Error {
                            detail: format!("invalid filter: {}", e),
                        });
                        return;
                    }
                },
                None => None,
            };

            let claims = identity.as_ref().map(|i| i.claims.clone());
            let is_admin = identity.as_ref().map(|i| i.is_admin).unwrap_or(false);

            let (id, mut stream) =
                match state.bus.subscribe(&collection, parsed_filter, claims, is_admin) {
                    Ok(subscribed) => subscribed,
                    Err(e) => {
                        let _ = tx.send(ServerFrame::Error {
                            detail: e.to_string(),
                        });
                        return;
                    }
                };

            // Re-subscribing to the same collection replaces the old stream.
            if let Some(previous) = subscriptions.remove(&collection) {
                let _ = state.bus.unsubscribe(&previous.id);
                previous.forwarder.abort();
            }

            let forward_tx = tx.clone();
            let forward_collection = collection.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(message) = stream.recv().await {
                    let frame = match message {
                        BusMessage::Event(event) => ServerFrame::Event {
                            event: event.kind,
                            collection: event.collection,
                            record: event.record,
                        },
                        BusMessage::Gap => ServerFrame::Gap {
                            collection: forward_collection.clone(),
                        },
                    };
                    if forward_tx.send(frame).is_err() {
                        break;
                    }
                }
            });

            log(
                Severity::Trace,
                "realtime.subscribe",
                &[("collection", collection.as_str())],
            );
            subscriptions.insert(collection.clone(), ActiveSubscription { id, forwarder });
            let _ = tx.send(ServerFrame::Subscribed { collection });
        }
        ClientFrame::Unsubscribe { collection } => {
            if let Some(subscription) = subscriptions.remove(&collection) {
                let _ = state.bus.unsubscribe(&subscription.id);
                subscription.forwarder.abort();
                let _ = tx.send(ServerFrame::Unsubscribed { collection });
            } else {
                let _ = tx.send(ServerFrame::Error {
                    detail: format!("no subscription for '{}'", collection),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_frame_parsing() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"action": "subscribe", "collection": "posts", "filter": "published = true"}"#,
        )
        .unwrap();
        assert!(matches!(
            frame,
            ClientFrame::Subscribe { collection, filter }
                if collection == "posts" && filter.as_deref() == Some("published = true")
        ));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"action": "unsubscribe", "collection": "posts"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Unsubscribe { .. }));
    }

    #[test]
    fn test_server_frame_shapes() {
        let event = ServerFrame::Event {
            event: EventKind::Create,
            collection: "posts".to_string(),
            record: json!({"id": "r1"}),
        };
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["frame"], "event");
        assert_eq!(wire["event"], "create");
        assert_eq!(wire["record"]["id"], "r1");

        let gap = ServerFrame::Gap {
            collection: "posts".to_string(),
        };
        let wire = serde_json::to_value(&gap).unwrap();
        assert_eq!(wire["frame"], "gap");
        assert_eq!(wire["collection"], "posts");
    }
}
