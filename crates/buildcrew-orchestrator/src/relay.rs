//! Per-project fan-out of worker events to live subscribers.
//!
//! Delivery is best-effort and at-most-once: publishing to a project nobody
//! is subscribed to is a silent no-op, nothing is buffered for later
//! delivery, and a slow subscriber observes a lag instead of applying
//! backpressure to the decode pipeline.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use buildcrew_core::ProjectId;

use crate::protocol::AgentMessage;

/// Default buffer capacity per project channel.
const DEFAULT_CAPACITY: usize = 256;

/// One event delivered to subscribers of a project.
///
/// Serializes to exactly what clients see on the wire: an `Update` is the raw
/// decoded message, an `Error` is `{"type":"error","message":...,"timestamp":...}`.
/// The two are distinguishable by their `type` field.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProjectEvent {
    /// Every decoded protocol message, forwarded verbatim.
    Update(AgentMessage),

    /// Worker-level failure: stderr text, spawn failures, error statuses.
    Error(ErrorFrame),
}

/// Error event surfaced to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    pub message: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl ErrorFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "error",
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Fan-out hub keyed by project id.
///
/// Channels are created lazily on [`subscribe`](BroadcastRelay::subscribe)
/// and pruned again once their last subscriber is gone, so idle projects
/// cost nothing.
pub struct BroadcastRelay {
    capacity: usize,
    channels: Mutex<HashMap<ProjectId, broadcast::Sender<ProjectEvent>>>,
}

impl BroadcastRelay {
    /// Create a relay with a specific per-project channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to all events published for `project_id`.
    pub fn subscribe(&self, project_id: &ProjectId) -> broadcast::Receiver<ProjectEvent> {
        let mut channels = self.channels.lock().expect("relay lock poisoned");
        channels
            .entry(project_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to whoever is currently subscribed to `project_id`.
    ///
    /// With zero subscribers this neither blocks nor errors; the event is
    /// dropped and the now-dead channel is pruned.
    pub fn publish(&self, project_id: &ProjectId, event: ProjectEvent) {
        let mut channels = self.channels.lock().expect("relay lock poisoned");
        if let Some(sender) = channels.get(project_id) {
            if sender.send(event).is_err() {
                debug!(project_id = %project_id, "Last subscriber gone, pruning channel");
                channels.remove(project_id);
            }
        }
    }

    /// Number of live subscribers for `project_id`.
    pub fn subscriber_count(&self, project_id: &ProjectId) -> usize {
        self.channels
            .lock()
            .expect("relay lock poisoned")
            .get(project_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for BroadcastRelay {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProgressPayload;

    fn progress_event(stage: &str) -> ProjectEvent {
        ProjectEvent::Update(AgentMessage::Progress {
            payload: ProgressPayload {
                stage: Some(stage.to_string()),
                progress: Some(5),
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_publish_with_no_subscribers_is_a_noop() {
        let relay = BroadcastRelay::default();
        let project_id = ProjectId::new("orphan");

        // Must neither panic nor retain anything.
        relay.publish(&project_id, progress_event("building"));
        assert_eq!(relay.subscriber_count(&project_id), 0);
    }

    #[tokio::test]
    async fn test_events_are_not_replayed_to_late_subscribers() {
        let relay = BroadcastRelay::default();
        let project_id = ProjectId::new("p-1");

        relay.publish(&project_id, progress_event("early"));

        let mut rx = relay.subscribe(&project_id);
        relay.publish(&project_id, progress_event("late"));

        match rx.recv().await.unwrap() {
            ProjectEvent::Update(AgentMessage::Progress { payload }) => {
                assert_eq!(payload.stage.as_deref(), Some("late"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_all_subscribers_see_events_in_publish_order() {
        let relay = BroadcastRelay::default();
        let project_id = ProjectId::new("p-1");

        let mut rx1 = relay.subscribe(&project_id);
        let mut rx2 = relay.subscribe(&project_id);

        relay.publish(&project_id, progress_event("first"));
        relay.publish(&project_id, ProjectEvent::Error(ErrorFrame::new("boom")));

        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(rx.recv().await.unwrap(), ProjectEvent::Update(_)));
            match rx.recv().await.unwrap() {
                ProjectEvent::Error(frame) => {
                    assert_eq!(frame.message, "boom");
                    assert!(frame.timestamp > 0);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_channel_pruned_after_last_subscriber_drops() {
        let relay = BroadcastRelay::default();
        let project_id = ProjectId::new("p-1");

        let rx = relay.subscribe(&project_id);
        drop(rx);

        relay.publish(&project_id, progress_event("building"));
        assert_eq!(relay.subscriber_count(&project_id), 0);
    }

    #[test]
    fn test_error_frame_wire_shape() {
        let frame = ErrorFrame::new("spawn failed");
        let json = serde_json::to_value(ProjectEvent::Error(frame)).unwrap();

        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "spawn failed");
        assert!(json["timestamp"].is_i64());
    }
}
