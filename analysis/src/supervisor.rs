//! Per-consumer owner of at most one analysis worker.
//!
//! The supervisor decides whether a request can reuse the current worker
//! (resume it or hand it a new position) or needs a fresh engine session.

use std::sync::Arc;
use std::time::Duration;

use engine::ChannelFactory;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::events::{AnalysisEvent, AnalysisKind};
use crate::handle::{spawn_worker, WorkerHandle};
use crate::mailbox::WorkerPhase;
use crate::params::{
    logical_cpus, validate_parameters, ParameterStore, Severity, TaskParameters,
};
use crate::worker::WorkerSetup;

/// How a request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// A suspended worker for the same engine was resumed.
    Resumed,
    /// The running worker was handed the new position.
    PositionUpdated,
    /// The worker for this engine had terminated and was rebuilt.
    Replaced,
    /// A new worker was started.
    Created,
}

pub struct AnalysisSupervisor<F: ChannelFactory> {
    kind: AnalysisKind,
    store: Arc<dyn ParameterStore>,
    factory: F,
    config: AnalysisConfig,
    events: UnboundedSender<AnalysisEvent>,
    worker: Option<WorkerHandle>,
    multipv: u32,
}

impl<F: ChannelFactory> AnalysisSupervisor<F> {
    /// Create a supervisor and the event stream of every worker it will run.
    pub fn new(
        kind: AnalysisKind,
        store: Arc<dyn ParameterStore>,
        factory: F,
        config: AnalysisConfig,
    ) -> (Self, UnboundedReceiver<AnalysisEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            kind,
            store,
            factory,
            config,
            events,
            worker: None,
            multipv: 1,
        };
        (supervisor, rx)
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Analyse `fen` with the engine at `engine_path`.
    pub fn request(
        &mut self,
        engine_path: &str,
        fen: &str,
    ) -> Result<RequestAction, AnalysisError> {
        let action = match self.worker.as_ref() {
            Some(worker) if worker.engine_path() == engine_path => match worker.phase() {
                WorkerPhase::Suspended => match worker.resume(fen) {
                    Ok(()) => {
                        tracing::debug!(task = %self.kind, engine = %engine_path, "Resuming analysis worker");
                        return Ok(RequestAction::Resumed);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Suspended worker cannot resume, replacing it");
                        RequestAction::Replaced
                    }
                },
                WorkerPhase::Terminated => {
                    tracing::info!(task = %self.kind, engine = %engine_path, "Replacing terminated analysis worker");
                    RequestAction::Replaced
                }
                WorkerPhase::Created
                | WorkerPhase::Handshaking
                | WorkerPhase::Ready
                | WorkerPhase::Searching => {
                    worker.update_position(fen);
                    return Ok(RequestAction::PositionUpdated);
                }
            },
            _ => RequestAction::Created,
        };

        self.detach_worker();
        self.worker = Some(self.create_worker(engine_path, fen)?);
        Ok(action)
    }

    /// Change the number of lines for manual analysis. Applies to the
    /// running worker and to every worker created later.
    pub fn set_multipv(&mut self, multipv: u32) {
        self.multipv = multipv.max(1);
        if let Some(worker) = &self.worker {
            worker.set_multipv(self.multipv);
        }
    }

    /// Pause the running search, keeping the engine process warm.
    pub fn suspend(&mut self) {
        if let Some(worker) = &self.worker {
            tracing::debug!(task = %self.kind, engine = %worker.engine_path(), "Suspending analysis worker");
            worker.suspend();
        }
    }

    /// Stop the worker without waiting for it.
    pub fn stop(&mut self) {
        self.detach_worker();
    }

    /// Drop the worker so the next request re-reads stored parameters.
    pub fn invalidate(&mut self) {
        if self.worker.is_some() {
            tracing::info!(task = %self.kind, "Parameters changed, dropping analysis worker");
        }
        self.detach_worker();
    }

    /// Stop the worker and wait up to `timeout` for it to finish.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        match self.worker.take() {
            Some(mut worker) => worker.join_timeout(timeout),
            None => true,
        }
    }

    pub fn phase(&self) -> Option<WorkerPhase> {
        self.worker.as_ref().map(WorkerHandle::phase)
    }

    pub fn engine_path(&self) -> Option<&str> {
        self.worker.as_ref().map(WorkerHandle::engine_path)
    }

    fn detach_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }

    fn create_worker(&self, engine_path: &str, fen: &str) -> Result<WorkerHandle, AnalysisError> {
        let params = self.resolve_parameters(engine_path);
        tracing::info!(
            task = %self.kind,
            engine = %engine_path,
            threads = params.threads,
            depth = params.depth,
            movetime = params.movetime_ms,
            multipv = params.multipv,
            "Starting analysis worker"
        );

        let channel = self.factory.create(engine_path, self.kind.as_str());
        let setup = WorkerSetup {
            kind: self.kind,
            engine_path: engine_path.to_string(),
            params,
            fen: fen.to_string(),
            config: self.config.clone(),
        };
        spawn_worker(setup, channel, self.events.clone())
    }

    /// Stored parameters over recommended defaults, checked for likely
    /// mistakes.
    fn resolve_parameters(&self, engine_path: &str) -> TaskParameters {
        let task = self.kind.task();
        let cpus = logical_cpus();
        let stored = self.store.task_parameters(engine_path, task);
        let mut params =
            TaskParameters::resolve(stored.as_ref(), TaskParameters::recommended_for_cpus(task, cpus));
        if self.kind.uses_multipv() {
            params = params.with_multipv(self.multipv);
        }

        for issue in validate_parameters(task, &params, cpus) {
            match issue.severity {
                Severity::Error | Severity::Warning => tracing::warn!(
                    engine = %engine_path,
                    task = %task,
                    parameter = issue.parameter,
                    severity = ?issue.severity,
                    "{}",
                    issue.message
                ),
                Severity::Info => tracing::info!(
                    engine = %engine_path,
                    task = %task,
                    parameter = issue.parameter,
                    "{}",
                    issue.message
                ),
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{InMemoryParameterStore, ParameterMap, Task};
    use engine::mock::ScriptedFactory;
    use serde_json::json;

    fn supervisor(
        kind: AnalysisKind,
        store: InMemoryParameterStore,
    ) -> AnalysisSupervisor<ScriptedFactory> {
        let (supervisor, _events) =
            AnalysisSupervisor::new(kind, Arc::new(store), ScriptedFactory::new(), AnalysisConfig::default());
        supervisor
    }

    #[test]
    fn test_resolve_uses_stored_parameters() {
        let store = InMemoryParameterStore::default();
        let stored: ParameterMap = json!({ "threads": 3, "Hash": 128, "depth": 25 })
            .as_object()
            .cloned()
            .unwrap();
        store.set("/opt/sf", Task::ManualAnalysis, stored);

        let mut sup = supervisor(AnalysisKind::ManualAnalysis, store);
        sup.set_multipv(3);
        let params = sup.resolve_parameters("/opt/sf");
        assert_eq!(params.threads, 3);
        assert_eq!(params.depth, 25);
        assert_eq!(params.multipv, 3);
        assert_eq!(params.option("Hash"), Some("128"));
    }

    #[test]
    fn test_resolve_falls_back_to_defaults() {
        let sup = supervisor(AnalysisKind::Evaluation, InMemoryParameterStore::default());
        let params = sup.resolve_parameters("/opt/unknown");
        let defaults = TaskParameters::recommended(Task::Evaluation);
        assert_eq!(params, defaults);
    }

    #[test]
    fn test_evaluation_ignores_multipv() {
        let mut sup = supervisor(AnalysisKind::Evaluation, InMemoryParameterStore::default());
        sup.set_multipv(4);
        assert_eq!(sup.resolve_parameters("/opt/sf").multipv, 1);
    }

    #[test]
    fn test_idle_supervisor() {
        let mut sup = supervisor(AnalysisKind::ManualAnalysis, InMemoryParameterStore::default());
        assert_eq!(sup.phase(), None);
        assert_eq!(sup.engine_path(), None);
        sup.suspend();
        sup.stop();
        assert!(sup.shutdown(Duration::from_millis(10)));
    }
}
