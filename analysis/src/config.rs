use std::time::Duration;

use crate::events::AnalysisKind;

/// Runtime tunables for analysis workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Minimum time between two emissions for the same line slot.
    pub update_interval: Duration,
    /// Read timeout while searching.
    pub poll_interval: Duration,
    /// Read timeout while suspended.
    pub suspended_poll_interval: Duration,
    pub handshake_timeout: Duration,
    pub ready_timeout: Duration,
    /// After a `go`, `bestmove` lines are attributed to the previous search
    /// for this long.
    pub bestmove_grace: Duration,
    /// Pause between `stop` and the next `position`.
    pub stop_settle: Duration,
    pub shutdown_ready_wait: Duration,
    pub exit_wait: Duration,
    pub evaluation_pv_moves: usize,
    pub manual_pv_moves: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            suspended_poll_interval: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(5),
            bestmove_grace: Duration::from_millis(100),
            stop_settle: Duration::from_millis(10),
            shutdown_ready_wait: Duration::from_secs(2),
            exit_wait: Duration::from_secs(3),
            evaluation_pv_moves: 5,
            manual_pv_moves: 50,
        }
    }
}

impl AnalysisConfig {
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// How many PV moves are rendered for results of this kind.
    pub fn pv_moves(&self, kind: AnalysisKind) -> usize {
        match kind {
            AnalysisKind::Evaluation => self.evaluation_pv_moves,
            AnalysisKind::ManualAnalysis => self.manual_pv_moves,
        }
    }
}
