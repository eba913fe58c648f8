//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Buildcrew.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Project not found.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
