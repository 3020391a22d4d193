use super::{Task, TaskParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterIssue {
    pub severity: Severity,
    pub parameter: &'static str,
    pub message: String,
}

impl ParameterIssue {
    fn new(severity: Severity, parameter: &'static str, message: String) -> Self {
        Self {
            severity,
            parameter,
            message,
        }
    }
}

/// Flag settings that are likely mistakes. None of these stop a worker from
/// starting; they are reported so the user can fix them.
pub fn validate_parameters(
    task: Task,
    params: &TaskParameters,
    cpus: usize,
) -> Vec<ParameterIssue> {
    let mut issues = Vec::new();
    let (depth, movetime) = (params.depth, params.movetime_ms);

    if params.threads as usize > cpus {
        issues.push(ParameterIssue::new(
            Severity::Warning,
            "threads",
            format!(
                "Thread count ({}) exceeds available logical CPU threads ({cpus})",
                params.threads
            ),
        ));
    }

    if let Some(hash_mb) = params.option("Hash").and_then(|v| v.trim().parse::<i64>().ok()) {
        if hash_mb < 1 {
            issues.push(ParameterIssue::new(
                Severity::Warning,
                "Hash",
                format!("Hash size ({hash_mb} MB) is very small, at least 16 MB is recommended"),
            ));
        } else if hash_mb > 8192 {
            issues.push(ParameterIssue::new(
                Severity::Info,
                "Hash",
                format!("Hash size ({hash_mb} MB) is very large"),
            ));
        }
    }

    if movetime > 0 && movetime < 10 {
        issues.push(ParameterIssue::new(
            Severity::Warning,
            "movetime",
            format!("Move time ({movetime} ms) is too low for meaningful analysis"),
        ));
    } else if movetime > 3_600_000 {
        issues.push(ParameterIssue::new(
            Severity::Info,
            "movetime",
            format!("Move time ({}s) is extremely high", movetime / 1000),
        ));
    }

    if depth > 100 {
        issues.push(ParameterIssue::new(
            Severity::Info,
            "depth",
            format!("Search depth ({depth}) is very high"),
        ));
    }

    if params.multipv > 10 {
        issues.push(ParameterIssue::new(
            Severity::Info,
            "MultiPV",
            format!("MultiPV ({}) will slow analysis down considerably", params.multipv),
        ));
    }

    match task {
        Task::Evaluation => {
            if depth > 0 {
                issues.push(ParameterIssue::new(
                    Severity::Warning,
                    "depth",
                    format!("Evaluation searches without a depth limit, depth {depth} is ignored"),
                ));
            }
            if movetime > 0 {
                issues.push(ParameterIssue::new(
                    Severity::Warning,
                    "movetime",
                    format!("Evaluation stops for good after {movetime} ms"),
                ));
            }
        }
        Task::GameAnalysis => {
            if movetime == 0 {
                issues.push(ParameterIssue::new(
                    Severity::Error,
                    "movetime",
                    "Game analysis needs a move time limit".to_string(),
                ));
            }
            if depth > 0 && movetime > 0 {
                issues.push(ParameterIssue::new(
                    Severity::Warning,
                    "depth",
                    format!("Both depth ({depth}) and move time ({movetime} ms) are set"),
                ));
            }
        }
        Task::ManualAnalysis => {
            if depth > 0 {
                issues.push(ParameterIssue::new(
                    Severity::Error,
                    "depth",
                    format!("Manual analysis is continuous, depth should be 0 (is {depth})"),
                ));
            }
            if movetime > 0 {
                issues.push(ParameterIssue::new(
                    Severity::Error,
                    "movetime",
                    format!("Manual analysis is continuous, move time should be 0 (is {movetime})"),
                ));
            }
        }
    }

    issues
}
