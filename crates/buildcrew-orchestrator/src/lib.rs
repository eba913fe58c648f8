//! Agent process supervision and event relay for Buildcrew.
//!
//! This crate is the concurrent heart of the system: it runs one external
//! agent worker process per active project, decodes the newline-delimited
//! JSON protocol the worker speaks on stdout, persists status transitions and
//! generated files through the [`ProjectStore`] collaborator, and fans every
//! decoded message out to per-project subscribers.
//!
//! The pipeline for one worker:
//!
//! ```text
//! stdout chunk -> LineDecoder -> EventRouter -> BroadcastRelay (always)
//!                                            -> StatusProjector / FileMaterializer
//! stderr line  ------------------------------> BroadcastRelay (error channel)
//! process exit -> AgentSupervisor -----------> StatusProjector (terminal status)
//! ```
//!
//! All collaborators are injected at construction; nothing here reaches into
//! global state to find its publish target.

mod error;
mod events;
mod protocol;
mod relay;
mod router;
mod store;
mod supervisor;

pub use error::OrchestratorError;
pub use events::{AgentEvent, AgentEvents};
pub use protocol::{AgentMessage, ErrorPayload, FilePayload, LineDecoder, ProgressPayload};
pub use relay::{BroadcastRelay, ErrorFrame, ProjectEvent};
pub use router::EventRouter;
pub use store::{FileMaterializer, ProjectStore, StatusProjector, StoreError};
pub use supervisor::{AgentSupervisor, WorkerCommand, WorkerState};
