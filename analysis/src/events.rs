//! What analysis workers report to their consumer.

use engine::EngineIdentity;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::AnalysisError;
use crate::params::Task;

/// The consumer a worker serves. Decides the result shape and how a finished
/// search is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    /// Single line feeding an evaluation bar.
    Evaluation,
    /// MultiPV lines for the manual analysis panel.
    ManualAnalysis,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::ManualAnalysis => "manual_analysis",
        }
    }

    /// The parameter-store task whose settings this kind uses.
    pub fn task(&self) -> Task {
        match self {
            Self::Evaluation => Task::Evaluation,
            Self::ManualAnalysis => Task::ManualAnalysis,
        }
    }

    pub fn uses_multipv(&self) -> bool {
        matches!(self, Self::ManualAnalysis)
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted analysis line, with scores from White's point of view.
#[derive(Debug, Clone, PartialEq)]
pub struct LineUpdate {
    /// The position this line was computed for.
    pub fen: String,
    /// MultiPV slot; only set for manual analysis.
    pub slot: Option<u32>,
    pub score_centipawns: f64,
    pub is_mate: bool,
    pub mate_distance: i32,
    pub depth: u32,
    /// `-1` when the engine has not reported it.
    pub nps: i64,
    /// Permille, `-1` when the engine has not reported it.
    pub hashfull: i32,
    pub principal_variation: String,
}

#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    EngineIdentified {
        engine_path: String,
        identity: EngineIdentity,
    },
    Line(LineUpdate),
    Error(AnalysisError),
}

/// Deliver `event`, or note that nobody is listening any more. Returns
/// whether it was delivered.
pub(crate) fn send_event(events: &UnboundedSender<AnalysisEvent>, event: AnalysisEvent) -> bool {
    let delivered = events.send(event).is_ok();
    if !delivered {
        tracing::trace!("Event receiver dropped");
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_send_event_after_receiver_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let error = AnalysisError::process_died("/opt/sf", "gone");
        assert!(send_event(&tx, AnalysisEvent::Error(error.clone())));
        assert!(matches!(rx.try_recv(), Ok(AnalysisEvent::Error(_))));

        drop(rx);
        assert!(!send_event(&tx, AnalysisEvent::Error(error)));
    }
}
