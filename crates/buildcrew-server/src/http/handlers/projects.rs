//! Project CRUD and lifecycle handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use buildcrew_core::{Project, ProjectConfig, ProjectId};

use crate::state::AppState;

fn ok<T: Serialize>(data: T) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}

fn fail(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "success": false, "message": message })))
}

/// Request body for creating a project.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: String,
    pub project_type: String,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl CreateProjectRequest {
    fn into_parts(self) -> Result<(String, ProjectConfig), String> {
        if self.name.is_empty() || self.name.len() > 100 {
            return Err("name must be between 1 and 100 characters".to_string());
        }
        let config = ProjectConfig {
            description: self.description,
            project_type: self.project_type,
            requirements: self.requirements,
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok((self.name, config))
    }
}

/// Create a project and kick off its build.
///
/// POST /api/projects
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    let (name, config) = match request.into_parts() {
        Ok(parts) => parts,
        Err(message) => return fail(StatusCode::BAD_REQUEST, &message),
    };

    let record = state.store.create(name, &config).await;

    // Worker failures surface through the status record and the error
    // broadcast, not through this response.
    if let Err(e) = state.supervisor.start(&record.id, &config).await {
        error!(project_id = %record.id, error = %e, "Failed to start agent worker");
    }

    ok(record)
}

/// List all projects, newest first.
///
/// GET /api/projects
pub async fn list_projects(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.store.list().await)
}

/// Get a single project.
///
/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&ProjectId::new(&id)).await {
        Ok(record) => ok(record),
        Err(_) => fail(StatusCode::NOT_FOUND, "Project not found"),
    }
}

/// Presentation labels for the agent roles.
///
/// These are derived from the single running flag; the roles are not
/// independently tracked.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRoleLabels {
    product_manager: &'static str,
    architect: &'static str,
    engineer: &'static str,
}

/// Worker status as reported to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    is_running: bool,
    agents: AgentRoleLabels,
}

impl AgentStatus {
    pub fn from_running(is_running: bool) -> Self {
        let label = if is_running { "running" } else { "idle" };
        Self {
            is_running,
            agents: AgentRoleLabels {
                product_manager: label,
                architect: label,
                engineer: label,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatusResponse {
    #[serde(flatten)]
    project: Project,
    agent_status: AgentStatus,
}

/// Get a project's record together with its live worker status.
///
/// GET /api/projects/:id/status
pub async fn get_project_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let project_id = ProjectId::new(&id);
    let project = match state.store.get(&project_id).await {
        Ok(record) => record,
        Err(_) => return fail(StatusCode::NOT_FOUND, "Project not found"),
    };

    let agent_status = AgentStatus::from_running(state.supervisor.is_running(&project_id));
    ok(ProjectStatusResponse {
        project,
        agent_status,
    })
}

/// List a project's generated files, newest first.
///
/// GET /api/projects/:id/files
pub async fn get_project_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    ok(state.store.files_for(&ProjectId::new(&id)).await)
}

/// Stop a project's build. A no-op when nothing is running.
///
/// POST /api/projects/:id/stop
pub async fn stop_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.supervisor.stop(&ProjectId::new(&id));
    StatusCode::NO_CONTENT
}

/// Liveness probe.
///
/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_status_labels_follow_running_flag() {
        let running = serde_json::to_value(AgentStatus::from_running(true)).unwrap();
        assert_eq!(running["isRunning"], true);
        assert_eq!(running["agents"]["productManager"], "running");
        assert_eq!(running["agents"]["engineer"], "running");

        let idle = serde_json::to_value(AgentStatus::from_running(false)).unwrap();
        assert_eq!(idle["isRunning"], false);
        assert_eq!(idle["agents"]["architect"], "idle");
    }

    #[test]
    fn test_create_request_validation() {
        let bad: CreateProjectRequest = serde_json::from_value(json!({
            "name": "",
            "description": "A todo list web application",
            "projectType": "web_app"
        }))
        .unwrap();
        assert!(bad.into_parts().is_err());

        let good: CreateProjectRequest = serde_json::from_value(json!({
            "name": "todo",
            "description": "A todo list web application",
            "projectType": "web_app",
            "requirements": ["user accounts"]
        }))
        .unwrap();
        let (name, config) = good.into_parts().unwrap();
        assert_eq!(name, "todo");
        assert_eq!(config.requirements, vec!["user accounts".to_string()]);
    }
}
