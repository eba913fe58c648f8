//! Project and generated-file records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{FileId, ProjectId};

/// Status a project is created with, before its worker reports a stage.
pub const STATUS_INITIALIZING: &str = "initializing";

/// Terminal status recorded when a worker exits cleanly.
pub const STATUS_COMPLETED: &str = "completed";

/// Terminal status recorded for spawn failures and non-zero exits.
pub const STATUS_ERROR: &str = "error";

/// A project record as stored and served to clients.
///
/// `status` is a free-form stage label reported by the worker (for example
/// `"building"`); only [`STATUS_COMPLETED`] and [`STATUS_ERROR`] are terminal.
/// `progress` is absent until the worker first reports one, and is cleared
/// again on failure to distinguish "never reported" from "reported then
/// failed".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub project_type: String,
    pub requirements: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A generated file as stored and served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub id: FileId,
    pub project_id: ProjectId,
    pub file_path: String,
    pub file_name: String,
    pub content: String,
    pub file_type: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A generated file record to be persisted, before storage assigns id and
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectFile {
    pub project_id: ProjectId,
    pub file_path: String,
    pub file_name: String,
    pub content: String,
    pub file_type: String,
    pub created_by: String,
}
