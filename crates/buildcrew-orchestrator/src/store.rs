//! Storage collaborator contract and the thin adapters the router drives.
//!
//! The orchestrator never reads project state back; it only writes status
//! transitions and generated files. Persistence failures are logged and
//! dropped so they can never stall the decode pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use buildcrew_core::{project, NewProjectFile, ProjectId};

/// Errors a storage backend may report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to persist the write.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Write-only storage contract consumed by the orchestrator.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persist a status transition, optionally with a 0-100 progress value.
    ///
    /// `progress: None` clears any previously stored value.
    async fn update_status(
        &self,
        project_id: &ProjectId,
        status: &str,
        progress: Option<u8>,
    ) -> Result<(), StoreError>;

    /// Persist one generated file record.
    async fn add_file(&self, file: NewProjectFile) -> Result<(), StoreError>;
}

/// Persists project status transitions, swallowing backend failures.
#[derive(Clone)]
pub struct StatusProjector {
    store: Arc<dyn ProjectStore>,
}

impl StatusProjector {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    /// Record a stage transition reported by the worker.
    pub async fn record(&self, project_id: &ProjectId, status: &str, progress: Option<u8>) {
        if let Err(e) = self.store.update_status(project_id, status, progress).await {
            error!(project_id = %project_id, status, error = %e, "Failed to persist status update");
        }
    }

    /// Record the terminal status for a clean worker exit.
    pub async fn complete(&self, project_id: &ProjectId) {
        self.record(project_id, project::STATUS_COMPLETED, Some(100))
            .await;
    }

    /// Record the terminal error status. Progress is cleared, not zeroed, to
    /// distinguish "never reported" from "reported then failed".
    pub async fn fail(&self, project_id: &ProjectId) {
        self.record(project_id, project::STATUS_ERROR, None).await;
    }
}

/// Persists generated file records, swallowing backend failures.
#[derive(Clone)]
pub struct FileMaterializer {
    store: Arc<dyn ProjectStore>,
}

impl FileMaterializer {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    /// Store one generated file.
    pub async fn materialize(&self, file: NewProjectFile) {
        let project_id = file.project_id.clone();
        let file_name = file.file_name.clone();
        match self.store.add_file(file).await {
            Ok(()) => {
                info!(project_id = %project_id, file_name, "Stored generated file");
            }
            Err(e) => {
                error!(project_id = %project_id, file_name, error = %e, "Failed to store generated file");
            }
        }
    }
}
