//! Shared application state.

use std::sync::Arc;

use buildcrew_orchestrator::{AgentSupervisor, BroadcastRelay};

use crate::store::MemoryStore;

/// Shared application state handed to every handler.
pub struct AppState {
    /// Project and file records, also serving the orchestrator's writes.
    pub store: Arc<MemoryStore>,

    /// Agent worker lifecycle operations.
    pub supervisor: Arc<AgentSupervisor>,

    /// Per-project event fan-out consumed by the WebSocket endpoint.
    pub relay: Arc<BroadcastRelay>,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(
        store: Arc<MemoryStore>,
        supervisor: Arc<AgentSupervisor>,
        relay: Arc<BroadcastRelay>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            supervisor,
            relay,
        })
    }
}
