//! In-memory project storage.
//!
//! Backs both the HTTP read paths and the orchestrator's write-only
//! [`ProjectStore`] contract. Terminal writes may arrive after a project's
//! worker is long gone; they are applied (or dropped) without error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use buildcrew_core::{
    project, CoreError, FileId, NewProjectFile, Project, ProjectConfig, ProjectFile, ProjectId,
};
use buildcrew_orchestrator::{ProjectStore, StoreError};

/// In-memory store indexed by project id.
pub struct MemoryStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
    files: RwLock<HashMap<ProjectId, Vec<ProjectFile>>>,
}

impl MemoryStore {
    /// Create a new store wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            projects: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
        })
    }

    /// Create a project record in the `initializing` state.
    pub async fn create(&self, name: impl Into<String>, config: &ProjectConfig) -> Project {
        let now = Utc::now();
        let record = Project {
            id: ProjectId::generate(),
            name: name.into(),
            description: config.description.clone(),
            project_type: config.project_type.clone(),
            requirements: config.requirements.clone(),
            status: project::STATUS_INITIALIZING.to_string(),
            progress: None,
            created_at: now,
            updated_at: now,
        };
        self.projects
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        info!(project_id = %record.id, "Project created");
        record
    }

    /// All projects, newest first.
    pub async fn list(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    /// Fetch one project.
    pub async fn get(&self, project_id: &ProjectId) -> Result<Project, CoreError> {
        self.projects
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| CoreError::ProjectNotFound(project_id.to_string()))
    }

    /// Stored files for a project, newest first.
    pub async fn files_for(&self, project_id: &ProjectId) -> Vec<ProjectFile> {
        let mut files = self
            .files
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        files
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn update_status(
        &self,
        project_id: &ProjectId,
        status: &str,
        progress: Option<u8>,
    ) -> Result<(), StoreError> {
        let mut projects = self.projects.write().await;
        match projects.get_mut(project_id) {
            Some(record) => {
                record.status = status.to_string();
                record.progress = progress;
                record.updated_at = Utc::now();
                info!(project_id = %project_id, status, "Project status updated");
            }
            None => {
                // Late write from a worker whose project record is gone.
                debug!(project_id = %project_id, status, "Status update for unknown project");
            }
        }
        Ok(())
    }

    async fn add_file(&self, file: NewProjectFile) -> Result<(), StoreError> {
        let record = ProjectFile {
            id: FileId::generate(),
            project_id: file.project_id.clone(),
            file_path: file.file_path,
            file_name: file.file_name,
            content: file.content,
            file_type: file.file_type,
            created_by: file.created_by,
            created_at: Utc::now(),
        };
        self.files
            .write()
            .await
            .entry(file.project_id)
            .or_default()
            .push(record);
        Ok(())
    }
}
