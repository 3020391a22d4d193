//! Running a worker on a dedicated thread and talking to it from outside.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use engine::EngineChannel;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::AnalysisError;
use crate::events::{send_event, AnalysisEvent, AnalysisKind};
use crate::mailbox::{Control, WorkerPhase, WorkerShared};
use crate::worker::{AnalysisWorker, WorkerSetup};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Start a worker on its own OS thread with a single-threaded runtime.
///
/// The worker begins handshaking immediately and searches `setup.fen` once
/// the engine is ready. Results and failures arrive on `events`.
pub fn spawn_worker<C>(
    setup: WorkerSetup,
    channel: C,
    events: UnboundedSender<AnalysisEvent>,
) -> Result<WorkerHandle, AnalysisError>
where
    C: EngineChannel + 'static,
{
    let shared = Arc::new(WorkerShared::default());
    let kind = setup.kind;
    let engine_path = setup.engine_path.clone();

    let worker_shared = shared.clone();
    let worker_engine = engine_path.clone();
    let thread = std::thread::Builder::new()
        .name(format!("analysis-{}", kind.as_str()))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build analysis runtime");
                    worker_shared.set_phase(WorkerPhase::Terminated);
                    let error = AnalysisError::SpawnFailure {
                        engine: worker_engine,
                        cause: e.to_string(),
                    };
                    send_event(&events, AnalysisEvent::Error(error));
                    return;
                }
            };
            let worker = AnalysisWorker::new(setup, channel, worker_shared, events);
            runtime.block_on(worker.run());
        })
        .map_err(|e| AnalysisError::SpawnFailure {
            engine: engine_path.clone(),
            cause: e.to_string(),
        })?;

    Ok(WorkerHandle {
        shared,
        engine_path,
        kind,
        thread: Some(thread),
    })
}

/// Owner-side view of a running worker. Every request is a non-blocking post;
/// dropping the handle asks the worker to shut down.
#[derive(Debug)]
pub struct WorkerHandle {
    shared: Arc<WorkerShared>,
    engine_path: String,
    kind: AnalysisKind,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Analyse `fen` next. Earlier positions not yet picked up are dropped,
    /// and so is a suspend the worker has not acted on yet.
    pub fn update_position(&self, fen: &str) {
        self.shared.post_resume(fen);
    }

    pub fn set_multipv(&self, multipv: u32) {
        self.shared.post_multipv(multipv);
    }

    pub fn suspend(&self) {
        self.shared.post_control(Control::Suspend);
    }

    /// Resume a suspended worker at `fen`. Fails right away if the worker
    /// has already terminated; an engine that turns out to be gone is
    /// reported through the event stream.
    pub fn resume(&self, fen: &str) -> Result<(), AnalysisError> {
        if self.phase() == WorkerPhase::Terminated {
            return Err(AnalysisError::process_died(
                &self.engine_path,
                "worker already terminated",
            ));
        }
        self.shared.post_resume(fen);
        Ok(())
    }

    pub fn phase(&self) -> WorkerPhase {
        self.shared.phase()
    }

    pub fn engine_path(&self) -> &str {
        &self.engine_path
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Ask the worker to stop. Does not wait for it.
    pub fn shutdown(&self) {
        self.shared.request_shutdown();
    }

    /// Ask the worker to stop and wait up to `timeout` for its thread to
    /// finish. Returns whether it did; a worker that does not finish in
    /// time is left to finish on its own.
    pub fn join_timeout(&mut self, timeout: Duration) -> bool {
        self.shutdown();
        let Some(thread) = self.thread.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    engine = %self.engine_path,
                    task = %self.kind,
                    "Analysis worker did not stop in time, detaching"
                );
                return false;
            }
            std::thread::sleep(JOIN_POLL);
        }

        if thread.join().is_err() {
            tracing::error!(engine = %self.engine_path, "Analysis worker panicked");
        }
        true
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shared.request_shutdown();
    }
}
