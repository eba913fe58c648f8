//! Orchestrator errors.
//!
//! Only `start`'s own setup errors surface to callers. Everything that
//! happens after a worker is running (decode failures, persistence failures,
//! worker crashes) is terminated locally into logs, status writes and
//! broadcasts instead of propagating.

use thiserror::Error;

/// Errors surfaced by the supervisor's public operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The project config could not be serialized for the worker command line.
    #[error("Failed to encode worker config: {0}")]
    ConfigEncode(#[from] serde_json::Error),
}
