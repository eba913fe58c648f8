//! WebSocket subscriber endpoint.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use buildcrew_core::ProjectId;

use crate::state::AppState;

/// Subscribe to a project's live events.
///
/// GET /api/projects/:id/events
///
/// Every decoded worker message and every worker-level error is forwarded as
/// one JSON text frame, in decode order. Events published while nobody is
/// connected are not replayed.
pub async fn project_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let project_id = ProjectId::new(&id);
    ws.on_upgrade(move |socket| relay_events(socket, state, project_id))
}

async fn relay_events(socket: WebSocket, state: Arc<AppState>, project_id: ProjectId) {
    let mut events = state.relay.subscribe(&project_id);
    info!(project_id = %project_id, "Subscriber attached");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(project_id = %project_id, error = %e, "Failed to encode event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(project_id = %project_id, skipped, "Subscriber too slow, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            // Clients only listen; any close or error on their side ends the
            // subscription.
            message = stream.next() => match message {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
    info!(project_id = %project_id, "Subscriber detached");
}
