use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast;
use tracing::debug;

use concord_types::DomainEvent;

use crate::state::AppState;

/// WebSocket upgrade for the push event stream. Each subscriber gets an
/// independent broadcast receiver; a lagging dashboard drops events instead
/// of backpressuring the core.
pub async fn events_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let receiver = state.events.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, receiver))
}

async fn stream_events(mut socket: WebSocket, mut receiver: broadcast::Receiver<DomainEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                let Ok(json) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!("event subscriber disconnected");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(missed, "event subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
