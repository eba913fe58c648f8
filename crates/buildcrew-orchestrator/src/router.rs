//! Routes decoded protocol messages to their side effects.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use buildcrew_core::{NewProjectFile, ProjectId};

use crate::events::{AgentEvent, AgentEvents};
use crate::protocol::{AgentMessage, ErrorPayload, FilePayload, ProgressPayload};
use crate::relay::{BroadcastRelay, ProjectEvent};
use crate::store::{FileMaterializer, ProjectStore, StatusProjector};

/// Dispatches each decoded message exactly once.
///
/// Every message is forwarded to the broadcast relay before any handler runs,
/// so subscribers see the full stream including types with no dedicated
/// handler. Handler failures never abort the rest of a batch: the persistence
/// adapters swallow and log backend errors.
pub struct EventRouter {
    relay: Arc<BroadcastRelay>,
    statuses: StatusProjector,
    files: FileMaterializer,
    events: AgentEvents,
}

impl EventRouter {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        relay: Arc<BroadcastRelay>,
        events: AgentEvents,
    ) -> Self {
        Self {
            relay,
            statuses: StatusProjector::new(store.clone()),
            files: FileMaterializer::new(store),
            events,
        }
    }

    /// Route one decoded message for `project_id`.
    pub async fn route(&self, project_id: &ProjectId, message: AgentMessage) {
        debug!(project_id = %project_id, message = ?message, "Agent message");
        self.relay
            .publish(project_id, ProjectEvent::Update(message.clone()));

        match message {
            AgentMessage::Progress { payload } => self.on_progress(project_id, payload).await,
            AgentMessage::FileGenerated { payload } => {
                self.on_file_generated(project_id, payload).await
            }
            AgentMessage::AgentMessage { payload } => self.on_agent_message(project_id, payload),
            AgentMessage::Error { payload } => self.on_agent_error(project_id, payload).await,
            AgentMessage::Unknown(value) => {
                debug!(project_id = %project_id, message = ?value, "No handler for message type");
            }
        }
    }

    async fn on_progress(&self, project_id: &ProjectId, payload: ProgressPayload) {
        if let (Some(stage), Some(progress)) = (payload.stage.as_deref(), payload.progress) {
            self.statuses.record(project_id, stage, Some(progress)).await;
        }
        self.events.publish(AgentEvent::Progress {
            project_id: project_id.clone(),
            payload,
        });
    }

    async fn on_file_generated(&self, project_id: &ProjectId, payload: FilePayload) {
        if let (Some(file_name), Some(content)) = (payload.file_name.clone(), payload.content.clone())
        {
            let file = NewProjectFile {
                project_id: project_id.clone(),
                file_path: payload.file_path.clone().unwrap_or_else(|| file_name.clone()),
                file_name,
                content,
                file_type: payload
                    .file_type
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                created_by: payload
                    .created_by
                    .clone()
                    .unwrap_or_else(|| "Agent".to_string()),
            };
            self.files.materialize(file).await;
        }
        self.events.publish(AgentEvent::FileGenerated {
            project_id: project_id.clone(),
            payload,
        });
    }

    fn on_agent_message(&self, project_id: &ProjectId, payload: Value) {
        self.events.publish(AgentEvent::AgentMessage {
            project_id: project_id.clone(),
            payload,
        });
    }

    async fn on_agent_error(&self, project_id: &ProjectId, payload: ErrorPayload) {
        self.statuses.fail(project_id).await;
        self.events.publish(AgentEvent::AgentError {
            project_id: project_id.clone(),
            payload,
        });
    }
}
