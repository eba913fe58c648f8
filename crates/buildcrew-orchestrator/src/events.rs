//! Typed in-process notifications for listeners inside the same process
//! (metrics, tests, future UI backends). Distinct from the per-project
//! subscriber relay: these carry every project on one channel.

use serde_json::Value;
use tokio::sync::broadcast;

use buildcrew_core::ProjectId;

use crate::protocol::{ErrorPayload, FilePayload, ProgressPayload};

/// Default buffer capacity for the notification channel.
const DEFAULT_CAPACITY: usize = 1024;

/// An internal notification emitted by the event router.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A worker reported a stage/progress update.
    Progress {
        project_id: ProjectId,
        payload: ProgressPayload,
    },

    /// A worker produced a file (whether or not it was persisted).
    FileGenerated {
        project_id: ProjectId,
        payload: FilePayload,
    },

    /// Free-form agent chatter.
    AgentMessage {
        project_id: ProjectId,
        payload: Value,
    },

    /// A worker reported a structured error.
    AgentError {
        project_id: ProjectId,
        payload: ErrorPayload,
    },
}

impl AgentEvent {
    /// The project this notification belongs to.
    pub fn project_id(&self) -> &ProjectId {
        match self {
            Self::Progress { project_id, .. }
            | Self::FileGenerated { project_id, .. }
            | Self::AgentMessage { project_id, .. }
            | Self::AgentError { project_id, .. } => project_id,
        }
    }
}

/// Broadcast hub for [`AgentEvent`]s.
#[derive(Clone)]
pub struct AgentEvents {
    sender: broadcast::Sender<AgentEvent>,
}

impl AgentEvents {
    /// Create a hub with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current listeners.
    ///
    /// With zero listeners the notification is silently dropped.
    pub fn publish(&self, event: AgentEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to all notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }
}

impl Default for AgentEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let events = AgentEvents::default();
        let mut rx = events.subscribe();

        let project_id = ProjectId::new("p-1");
        events.publish(AgentEvent::Progress {
            project_id: project_id.clone(),
            payload: ProgressPayload::default(),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.project_id(), &project_id);
        assert!(matches!(received, AgentEvent::Progress { .. }));
    }

    #[test]
    fn test_publish_without_listeners_does_not_panic() {
        let events = AgentEvents::default();
        events.publish(AgentEvent::AgentMessage {
            project_id: ProjectId::new("p-1"),
            payload: Value::Null,
        });
    }
}
