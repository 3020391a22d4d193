//! Continuous engine analysis: workers that keep a UCI engine searching the
//! current position, and the supervisor that decides when to reuse them.

pub mod config;
pub mod error;
pub mod events;
pub mod handle;
mod mailbox;
pub mod params;
pub mod slots;
pub mod supervisor;
pub mod throttle;
mod worker;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, ErrorKind};
pub use events::{AnalysisEvent, AnalysisKind, LineUpdate};
pub use handle::{spawn_worker, WorkerHandle};
pub use mailbox::WorkerPhase;
pub use params::{
    validate_parameters, InMemoryParameterStore, JsonParameterStore, ParameterIssue, ParameterMap,
    ParameterStore, ParameterStoreError, Severity, Task, TaskParameters,
};
pub use supervisor::{AnalysisSupervisor, RequestAction};
pub use worker::WorkerSetup;
