// =============================================================================
// WebSocket Handler — Push-based chart updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. The current chart frame and feed status immediately on connect.
//   2. Every new chart frame as soon as the orchestrator publishes it.
//   3. Every feed status change.
//
// Frames that are superseded before a slow client reads them are skipped;
// the client always converges on the latest one.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::feed::FeedStatus;
use crate::recompute::ChartFrame;

/// Outbound message envelope.
#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum WsEvent<'a> {
    Frame(&'a ChartFrame),
    Feed(&'a FeedStatus),
}

#[derive(Serialize)]
struct WsEnvelope<'a> {
    seq: u64,
    #[serde(flatten)]
    event: WsEvent<'a>,
}

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Per-connection receivers; mark the current values as seen.
    let mut frames = state.frames.clone();
    let mut feed = state.feed_status.clone();

    let frame = Arc::clone(&frames.borrow_and_update());
    let status = feed.borrow_and_update().clone();
    if send_event(&mut sender, &state, WsEvent::Frame(&frame)).await.is_err()
        || send_event(&mut sender, &state, WsEvent::Feed(&status)).await.is_err()
    {
        warn!("failed to send initial WebSocket payload");
        return;
    }

    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    info!("chart frame channel closed — disconnecting");
                    break;
                }
                let frame = Arc::clone(&frames.borrow_and_update());
                if let Err(e) = send_event(&mut sender, &state, WsEvent::Frame(&frame)).await {
                    debug!(error = %e, "WebSocket send failed — disconnecting");
                    break;
                }
            }

            changed = feed.changed() => {
                if changed.is_err() {
                    info!("feed status channel closed — disconnecting");
                    break;
                }
                let status = feed.borrow_and_update().clone();
                if let Err(e) = send_event(&mut sender, &state, WsEvent::Feed(&status)).await {
                    debug!(error = %e, "WebSocket send failed — disconnecting");
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "Failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received — disconnecting");
                        break;
                    }
                    // Text / Binary / Pong: nothing to do.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended (None)");
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Serialize and send one event, stamped with the global sequence number.
async fn send_event<S>(sender: &mut S, state: &AppState, event: WsEvent<'_>) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let seq = state.next_ws_sequence();
    match serde_json::to_string(&WsEnvelope { seq, event }) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            debug!(seq, "WebSocket event sent");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Failed to serialize WebSocket event");
            // Serialisation errors are not network errors; don't disconnect.
            Ok(())
        }
    }
}
