//! Supervises one external agent worker process per active project.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use buildcrew_core::{ProjectConfig, ProjectId};

use crate::error::OrchestratorError;
use crate::protocol::LineDecoder;
use crate::relay::{BroadcastRelay, ErrorFrame, ProjectEvent};
use crate::router::EventRouter;
use crate::store::{ProjectStore, StatusProjector};

/// How to launch an agent worker process.
///
/// The supervisor appends `--project-id <id> --config <json>` to the
/// configured base arguments.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: String,
    base_args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl WorkerCommand {
    /// Create a command for the given program.
    ///
    /// The program can be a bare name for PATH lookup, or a full path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append base arguments placed before the per-project arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory the worker runs in.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Lifecycle state of a supervised worker.
///
/// `Starting -> Running -> Exited | Failed`; there is no way back to
/// `Running`. Terminal states coincide with removal from the active set, so
/// [`AgentSupervisor::state`] only ever observes the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Process is being spawned and wired up.
    Starting,
    /// Process is live; its output is being routed.
    Running,
    /// Process exited with the given code.
    Exited(i32),
    /// Process could not be waited on.
    Failed,
}

/// Supervisor-side handle for one live worker.
///
/// The OS child itself is owned by the worker's monitor task; the handle only
/// carries the kill switch, so `stop` never waits for process death.
struct WorkerHandle {
    state: WorkerState,
    kill: oneshot::Sender<()>,
}

impl WorkerHandle {
    /// Request termination. Fire-and-forget: the monitor task does the
    /// signalling and reaping.
    fn terminate(self) {
        let _ = self.kill.send(());
    }
}

/// Owns the set of active workers and wires each one into the
/// decode/route/broadcast pipeline.
///
/// At most one worker runs per project id; starting an already-running
/// project is an informational no-op. The active map is the only shared
/// state and is touched strictly under its mutex, never across an await.
pub struct AgentSupervisor {
    worker: WorkerCommand,
    active: Arc<Mutex<HashMap<ProjectId, WorkerHandle>>>,
    router: Arc<EventRouter>,
    relay: Arc<BroadcastRelay>,
    statuses: StatusProjector,
}

impl AgentSupervisor {
    pub fn new(
        worker: WorkerCommand,
        store: Arc<dyn ProjectStore>,
        relay: Arc<BroadcastRelay>,
        router: Arc<EventRouter>,
    ) -> Self {
        Self {
            worker,
            active: Arc::new(Mutex::new(HashMap::new())),
            router,
            relay,
            statuses: StatusProjector::new(store),
        }
    }

    /// Start a worker for `project_id` unless one is already active.
    ///
    /// A spawn failure does not error: it is terminated locally into an
    /// `error` status plus an error broadcast, so subscribers are never left
    /// waiting on a worker that will never speak. Only config serialization
    /// problems surface to the caller.
    pub async fn start(
        &self,
        project_id: &ProjectId,
        config: &ProjectConfig,
    ) -> Result<(), OrchestratorError> {
        let config_json = serde_json::to_string(config)?;

        let spawn_error = {
            let mut active = self.active.lock().expect("supervisor lock poisoned");
            if active.contains_key(project_id) {
                warn!(project_id = %project_id, "Project is already running");
                return Ok(());
            }

            info!(
                project_id = %project_id,
                program = %self.worker.program,
                "Starting agent worker"
            );

            let mut cmd = Command::new(&self.worker.program);
            cmd.args(&self.worker.base_args)
                .arg("--project-id")
                .arg(project_id.as_str())
                .arg("--config")
                .arg(&config_json)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(dir) = &self.worker.working_dir {
                cmd.current_dir(dir);
            }

            match cmd.spawn() {
                Ok(child) => {
                    let (kill_tx, kill_rx) = oneshot::channel();
                    active.insert(
                        project_id.clone(),
                        WorkerHandle {
                            state: WorkerState::Starting,
                            kill: kill_tx,
                        },
                    );
                    self.wire_worker(project_id, child, kill_rx);
                    if let Some(handle) = active.get_mut(project_id) {
                        handle.state = WorkerState::Running;
                    }
                    None
                }
                Err(e) => Some(e),
            }
        };

        if let Some(e) = spawn_error {
            error!(project_id = %project_id, error = %e, "Failed to spawn agent worker");
            self.statuses.fail(project_id).await;
            self.relay.publish(
                project_id,
                ProjectEvent::Error(ErrorFrame::new(format!(
                    "Failed to start agent worker: {e}"
                ))),
            );
        }
        Ok(())
    }

    /// Request termination of `project_id`'s worker and forget it immediately.
    ///
    /// Does not wait for process death; the monitor task reaps the process
    /// and tolerates the handle already being gone. Unknown ids are a no-op.
    pub fn stop(&self, project_id: &ProjectId) {
        let handle = self
            .active
            .lock()
            .expect("supervisor lock poisoned")
            .remove(project_id);
        match handle {
            Some(handle) => {
                handle.terminate();
                info!(project_id = %project_id, "Stopped agent worker");
            }
            None => {
                debug!(project_id = %project_id, "Stop requested for inactive project");
            }
        }
    }

    /// Terminate every active worker. Used during orderly shutdown.
    pub fn stop_all(&self) {
        let drained: Vec<(ProjectId, WorkerHandle)> = self
            .active
            .lock()
            .expect("supervisor lock poisoned")
            .drain()
            .collect();
        for (project_id, handle) in drained {
            handle.terminate();
            info!(project_id = %project_id, "Stopped agent worker");
        }
    }

    /// Whether a worker is currently active for `project_id`.
    pub fn is_running(&self, project_id: &ProjectId) -> bool {
        self.active
            .lock()
            .expect("supervisor lock poisoned")
            .contains_key(project_id)
    }

    /// Lifecycle state of `project_id`'s worker, if one is active.
    pub fn state(&self, project_id: &ProjectId) -> Option<WorkerState> {
        self.active
            .lock()
            .expect("supervisor lock poisoned")
            .get(project_id)
            .map(|handle| handle.state)
    }

    /// Number of active workers.
    pub fn active_count(&self) -> usize {
        self.active.lock().expect("supervisor lock poisoned").len()
    }

    /// Wire a freshly spawned child into the pipeline: stdout through the
    /// decoder into the router, stderr straight to the error broadcast, and
    /// a monitor task that records the terminal status on exit.
    fn wire_worker(&self, project_id: &ProjectId, mut child: Child, kill_rx: oneshot::Receiver<()>) {
        let stdout_task = child.stdout.take().map(|stdout| {
            let router = Arc::clone(&self.router);
            let pid = project_id.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout);
                let mut decoder = LineDecoder::new();
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) => break,
                        Ok(_) => {
                            for message in decoder.decode(&line) {
                                router.route(&pid, message).await;
                            }
                        }
                        Err(e) => {
                            error!(project_id = %pid, error = %e, "Error reading worker stdout");
                            break;
                        }
                    }
                }
                if let Some(message) = decoder.finish() {
                    router.route(&pid, message).await;
                }
                debug!(project_id = %pid, "Worker stdout closed");
            })
        });

        let stderr_task = child.stderr.take().map(|stderr| {
            let relay = Arc::clone(&self.relay);
            let pid = project_id.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) => break,
                        Ok(_) => {
                            let trimmed = line.trim();
                            if !trimmed.is_empty() {
                                error!(project_id = %pid, stderr = %trimmed, "Agent worker error");
                                relay.publish(&pid, ProjectEvent::Error(ErrorFrame::new(trimmed)));
                            }
                        }
                        Err(e) => {
                            error!(project_id = %pid, error = %e, "Error reading worker stderr");
                            break;
                        }
                    }
                }
            })
        });

        let active = Arc::clone(&self.active);
        let statuses = self.statuses.clone();
        let pid = project_id.clone();
        tokio::spawn(async move {
            let exit = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    debug!(project_id = %pid, "Terminating worker on request");
                    if let Err(e) = child.start_kill() {
                        warn!(project_id = %pid, error = %e, "Failed to signal worker");
                    }
                    child.wait().await
                }
            };

            // stop() may already have removed the handle; removal is
            // idempotent and the terminal status is recorded either way.
            active
                .lock()
                .expect("supervisor lock poisoned")
                .remove(&pid);

            // The pumps end at pipe EOF, which exit guarantees. Draining
            // them first keeps the terminal status the last write for this
            // project.
            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }

            match exit {
                Ok(status) if status.success() => {
                    let state = WorkerState::Exited(0);
                    info!(project_id = %pid, state = ?state, "Agent worker completed");
                    statuses.complete(&pid).await;
                }
                Ok(status) => {
                    let state = WorkerState::Exited(status.code().unwrap_or(-1));
                    info!(project_id = %pid, state = ?state, "Agent worker failed");
                    statuses.fail(&pid).await;
                }
                Err(e) => {
                    let state = WorkerState::Failed;
                    error!(project_id = %pid, state = ?state, error = %e, "Failed waiting on agent worker");
                    statuses.fail(&pid).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::AgentEvents;
    use crate::protocol::AgentMessage;
    use crate::store::testing::RecordingStore;

    fn sh_worker(script: &str) -> WorkerCommand {
        // $0 is "worker"; the per-project arguments arrive as $1..$4.
        WorkerCommand::new("/bin/sh").with_args(["-c", script, "worker"])
    }

    fn supervisor_with(
        worker: WorkerCommand,
    ) -> (AgentSupervisor, Arc<RecordingStore>, Arc<BroadcastRelay>) {
        let store = Arc::new(RecordingStore::default());
        let store_dyn: Arc<dyn ProjectStore> = store.clone();
        let relay = Arc::new(BroadcastRelay::default());
        let events = AgentEvents::default();
        let router = Arc::new(EventRouter::new(
            store_dyn.clone(),
            relay.clone(),
            events,
        ));
        let supervisor = AgentSupervisor::new(worker, store_dyn, relay.clone(), router);
        (supervisor, store, relay)
    }

    fn config() -> ProjectConfig {
        ProjectConfig {
            description: "A small demo project".to_string(),
            project_type: "script".to_string(),
            requirements: vec![],
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached within 5s");
    }

    #[tokio::test]
    async fn test_clean_exit_projects_progress_then_completed() {
        let script = r#"printf '%s\n' '{"type":"progress","payload":{"stage":"building","progress":42}}'; exit 0"#;
        let (supervisor, store, relay) = supervisor_with(sh_worker(script));
        let project_id = ProjectId::new("p-1");
        let mut rx = relay.subscribe(&project_id);

        supervisor.start(&project_id, &config()).await.unwrap();
        wait_until(|| store.statuses().len() == 2).await;

        let statuses = store.statuses();
        assert_eq!(
            statuses[0],
            (project_id.clone(), "building".to_string(), Some(42))
        );
        assert_eq!(
            statuses[1],
            (project_id.clone(), "completed".to_string(), Some(100))
        );
        assert!(!supervisor.is_running(&project_id));

        match rx.recv().await.unwrap() {
            ProjectEvent::Update(AgentMessage::Progress { payload }) => {
                assert_eq!(payload.stage.as_deref(), Some("building"));
                assert_eq!(payload.progress, Some(42));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_projects_error_with_unset_progress() {
        let (supervisor, store, _relay) = supervisor_with(sh_worker("exit 1"));
        let project_id = ProjectId::new("p-1");

        supervisor.start(&project_id, &config()).await.unwrap();
        wait_until(|| !store.statuses().is_empty()).await;

        assert_eq!(
            store.statuses(),
            vec![(project_id.clone(), "error".to_string(), None)]
        );
        assert!(!supervisor.is_running(&project_id));
    }

    #[tokio::test]
    async fn test_duplicate_start_is_a_noop() {
        let (supervisor, _store, _relay) = supervisor_with(sh_worker("sleep 30"));
        let project_id = ProjectId::new("p-1");

        supervisor.start(&project_id, &config()).await.unwrap();
        supervisor.start(&project_id, &config()).await.unwrap();

        assert_eq!(supervisor.active_count(), 1);
        assert_eq!(supervisor.state(&project_id), Some(WorkerState::Running));

        supervisor.stop(&project_id);
        assert!(!supervisor.is_running(&project_id));
    }

    #[tokio::test]
    async fn test_stop_unknown_project_and_stop_all_empty_are_noops() {
        let (supervisor, store, _relay) = supervisor_with(sh_worker("exit 0"));

        supervisor.stop(&ProjectId::new("ghost"));
        supervisor.stop_all();

        assert_eq!(supervisor.active_count(), 0);
        assert!(store.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_stop_all_clears_every_worker() {
        let (supervisor, _store, _relay) = supervisor_with(sh_worker("sleep 30"));

        supervisor.start(&ProjectId::new("p-1"), &config()).await.unwrap();
        supervisor.start(&ProjectId::new("p-2"), &config()).await.unwrap();
        assert_eq!(supervisor.active_count(), 2);

        supervisor.stop_all();
        assert_eq!(supervisor.active_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_projects_error_and_broadcasts() {
        let (supervisor, store, relay) =
            supervisor_with(WorkerCommand::new("/nonexistent/agent-worker"));
        let project_id = ProjectId::new("p-1");
        let mut rx = relay.subscribe(&project_id);

        supervisor.start(&project_id, &config()).await.unwrap();

        assert_eq!(
            store.statuses(),
            vec![(project_id.clone(), "error".to_string(), None)]
        );
        assert!(!supervisor.is_running(&project_id));

        match rx.recv().await.unwrap() {
            ProjectEvent::Error(frame) => {
                assert!(frame.message.starts_with("Failed to start agent worker"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stderr_is_broadcast_verbatim() {
        let script = r#"echo kaboom 1>&2; exit 0"#;
        let (supervisor, _store, relay) = supervisor_with(sh_worker(script));
        let project_id = ProjectId::new("p-1");
        let mut rx = relay.subscribe(&project_id);

        supervisor.start(&project_id, &config()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no stderr broadcast within 5s")
            .unwrap();
        match event {
            ProjectEvent::Error(frame) => assert_eq!(frame.message, "kaboom"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_receives_project_id_argument() {
        // The worker echoes $2 (the value after --project-id) back as its
        // reported stage.
        let script =
            r#"printf '{"type":"progress","payload":{"stage":"%s","progress":1}}\n' "$2"; exit 0"#;
        let (supervisor, store, _relay) = supervisor_with(sh_worker(script));
        let project_id = ProjectId::new("p-42");

        supervisor.start(&project_id, &config()).await.unwrap();
        wait_until(|| store.statuses().len() == 2).await;

        assert_eq!(
            store.statuses()[0],
            (project_id, "p-42".to_string(), Some(1))
        );
    }
}
