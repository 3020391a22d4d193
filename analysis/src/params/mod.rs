//! Task parameters: what a worker is configured with, where the values come
//! from and how suspicious settings are reported.

mod store;
mod validation;

pub use store::{
    EngineParameters, InMemoryParameterStore, JsonParameterStore, ParameterStore,
    ParameterStoreError,
};
pub use validation::{validate_parameters, ParameterIssue, Severity};

use engine::SearchLimits;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored parameters for one engine and task, as written to the store:
/// `threads`, `depth`, `movetime` and any engine option by name.
pub type ParameterMap = serde_json::Map<String, Value>;

/// Task identifiers used as keys in the parameter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Evaluation,
    GameAnalysis,
    ManualAnalysis,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::Evaluation, Task::GameAnalysis, Task::ManualAnalysis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::GameAnalysis => "game_analysis",
            Self::ManualAnalysis => "manual_analysis",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The effective settings for one worker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskParameters {
    pub threads: u32,
    /// 0 means unlimited.
    pub depth: u32,
    /// 0 means unlimited.
    pub movetime_ms: u64,
    pub multipv: u32,
    /// Engine-specific `setoption` pairs, in the order they are sent.
    pub options: Vec<(String, String)>,
}

impl TaskParameters {
    /// Recommended defaults for a task on this machine.
    pub fn recommended(task: Task) -> Self {
        Self::recommended_for_cpus(task, logical_cpus())
    }

    pub fn recommended_for_cpus(task: Task, cpus: usize) -> Self {
        let reserved = 2;
        let threads = cpus.saturating_sub(reserved).clamp(1, 4) as u32;
        let (depth, movetime_ms) = match task {
            Task::Evaluation | Task::ManualAnalysis => (0, 0),
            Task::GameAnalysis => (40, 1000),
        };
        Self {
            threads,
            depth,
            movetime_ms,
            multipv: 1,
            options: Vec::new(),
        }
    }

    /// Overlay stored values on `defaults`. `threads`, `depth` and `movetime`
    /// are read by key; every other scalar entry becomes an engine option.
    /// `Threads` and `MultiPV` entries are skipped because those options are
    /// driven by the dedicated fields.
    pub fn resolve(stored: Option<&ParameterMap>, defaults: TaskParameters) -> Self {
        let Some(stored) = stored else {
            return defaults;
        };

        let mut params = defaults;
        if let Some(threads) = stored.get("threads").and_then(as_u64) {
            params.threads = threads.clamp(1, u64::from(u32::MAX)) as u32;
        }
        if let Some(depth) = stored.get("depth").and_then(as_u64) {
            params.depth = depth.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(movetime) = stored.get("movetime").and_then(as_u64) {
            params.movetime_ms = movetime;
        }

        params.options = stored
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "threads" | "depth" | "movetime"))
            .filter(|(key, _)| {
                !key.eq_ignore_ascii_case("threads") && !key.eq_ignore_ascii_case("multipv")
            })
            .filter_map(|(key, value)| match option_value(value) {
                Some(text) => Some((key.clone(), text)),
                None => {
                    tracing::debug!(option = %key, "Skipping non-scalar stored option");
                    None
                }
            })
            .collect();
        params
    }

    pub fn with_multipv(mut self, multipv: u32) -> Self {
        self.multipv = multipv.max(1);
        self
    }

    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            depth: self.depth,
            movetime_ms: self.movetime_ms,
        }
    }

    /// Value of an engine option by case-insensitive name.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub fn logical_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn option_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ParameterMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected a JSON object"),
        }
    }

    #[test]
    fn test_recommended_threads() {
        assert_eq!(TaskParameters::recommended_for_cpus(Task::Evaluation, 1).threads, 1);
        assert_eq!(TaskParameters::recommended_for_cpus(Task::Evaluation, 3).threads, 1);
        assert_eq!(TaskParameters::recommended_for_cpus(Task::Evaluation, 5).threads, 3);
        assert_eq!(TaskParameters::recommended_for_cpus(Task::Evaluation, 32).threads, 4);
    }

    #[test]
    fn test_recommended_limits_per_task() {
        let eval = TaskParameters::recommended_for_cpus(Task::Evaluation, 8);
        assert_eq!((eval.depth, eval.movetime_ms), (0, 0));
        let game = TaskParameters::recommended_for_cpus(Task::GameAnalysis, 8);
        assert_eq!((game.depth, game.movetime_ms), (40, 1000));
        let manual = TaskParameters::recommended_for_cpus(Task::ManualAnalysis, 8);
        assert_eq!((manual.depth, manual.movetime_ms), (0, 0));
        assert!(manual.limits().is_infinite());
    }

    #[test]
    fn test_resolve_without_entry_uses_defaults() {
        let defaults = TaskParameters::recommended_for_cpus(Task::ManualAnalysis, 8);
        assert_eq!(TaskParameters::resolve(None, defaults.clone()), defaults);
    }

    #[test]
    fn test_resolve_splits_options() {
        let stored = map(json!({
            "threads": 2,
            "depth": 18,
            "movetime": "500",
            "Hash": 256,
            "Ponder": false,
            "Style": "Risky",
            "MultiPV": 4,
            "Threads": 8,
            "nested": {"a": 1}
        }));
        let defaults = TaskParameters::recommended_for_cpus(Task::ManualAnalysis, 8);
        let params = TaskParameters::resolve(Some(&stored), defaults);

        assert_eq!(params.threads, 2);
        assert_eq!(params.depth, 18);
        assert_eq!(params.movetime_ms, 500);
        assert_eq!(params.option("hash"), Some("256"));
        assert_eq!(params.option("Ponder"), Some("false"));
        assert_eq!(params.option("Style"), Some("Risky"));
        assert_eq!(params.option("MultiPV"), None);
        assert_eq!(params.option("Threads"), None);
        assert_eq!(params.options.len(), 3);
    }

    #[test]
    fn test_resolve_ignores_bad_values() {
        let stored = map(json!({"threads": 0, "depth": -3, "movetime": "soon"}));
        let defaults = TaskParameters::recommended_for_cpus(Task::GameAnalysis, 8);
        let params = TaskParameters::resolve(Some(&stored), defaults);
        assert_eq!(params.threads, 1);
        assert_eq!(params.depth, 40);
        assert_eq!(params.movetime_ms, 1000);
    }

    #[test]
    fn test_task_serde_names() {
        assert_eq!(serde_json::to_string(&Task::GameAnalysis).unwrap(), "\"game_analysis\"");
        assert_eq!(Task::ManualAnalysis.to_string(), "manual_analysis");
    }
}
