//! Buildcrew API Server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use buildcrew_orchestrator::{
    AgentEvents, AgentSupervisor, BroadcastRelay, EventRouter, ProjectStore, WorkerCommand,
};

mod http;
mod state;
mod store;

use state::AppState;
use store::MemoryStore;

/// Buildcrew API server.
#[derive(Debug, Parser)]
#[command(name = "buildcrew-server")]
struct Args {
    /// Address to bind the HTTP server on.
    #[arg(long, default_value = "127.0.0.1:3001")]
    bind: SocketAddr,

    /// Program used to launch agent workers.
    #[arg(long, default_value = "python3")]
    worker_program: String,

    /// Base argument passed to the worker program before the per-project
    /// arguments. Repeatable.
    #[arg(long = "worker-arg", default_value = "agents/main.py")]
    worker_args: Vec<String>,

    /// Working directory agent workers run in.
    #[arg(long)]
    worker_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut worker = WorkerCommand::new(&args.worker_program).with_args(args.worker_args.clone());
    if let Some(dir) = &args.worker_dir {
        worker = worker.with_working_dir(dir);
    }

    let store = MemoryStore::new();
    let store_dyn: Arc<dyn ProjectStore> = store.clone();
    let relay = Arc::new(BroadcastRelay::default());
    let events = AgentEvents::default();
    let router = Arc::new(EventRouter::new(store_dyn.clone(), relay.clone(), events));
    let supervisor = Arc::new(AgentSupervisor::new(
        worker,
        store_dyn,
        relay.clone(),
        router,
    ));

    let state = AppState::new(store, supervisor, relay);

    let listener = TcpListener::bind(args.bind).await?;
    info!(
        addr = %args.bind,
        worker = %args.worker_program,
        "Server running"
    );

    axum::serve(listener, http::create_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Wait for ctrl-c, then terminate every active agent worker before the
/// server winds down.
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutting down, stopping active agent workers");
    state.supervisor.stop_all();
}
