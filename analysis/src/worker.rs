//! One engine conversation, driven as a state machine on its own thread.
//!
//! The worker owns the channel and all search state. It talks to the outside
//! only through [`WorkerShared`] (requests in, phase out) and the event
//! sender (results out).

use std::sync::Arc;

use engine::uci::parse_pv;
use engine::{
    parse_uci_message, ChannelError, EngineChannel, EngineIdentity, InfoLine, SearchLimits,
    UciMessage,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::events::{send_event, AnalysisEvent, AnalysisKind, LineUpdate};
use crate::mailbox::{Control, WorkerPhase, WorkerShared};
use crate::params::TaskParameters;
use crate::slots::SlotTable;
use crate::throttle::EmissionThrottle;

/// Everything a worker is started with.
#[derive(Debug, Clone)]
pub struct WorkerSetup {
    pub kind: AnalysisKind,
    pub engine_path: String,
    pub params: TaskParameters,
    pub fen: String,
    pub config: AnalysisConfig,
}

#[derive(Debug)]
struct SearchCursor {
    fen: String,
    go_sent: bool,
    black_to_move: bool,
    started_at: Instant,
}

pub(crate) struct AnalysisWorker<C> {
    kind: AnalysisKind,
    engine_path: String,
    params: TaskParameters,
    multipv: u32,
    multipv_dirty: bool,
    config: AnalysisConfig,
    channel: C,
    shared: Arc<WorkerShared>,
    events: UnboundedSender<AnalysisEvent>,
    phase: WorkerPhase,
    target_fen: String,
    cursor: Option<SearchCursor>,
    slots: SlotTable,
    throttle: EmissionThrottle<LineUpdate>,
    nps: Option<u64>,
    hashfull: Option<u32>,
}

impl<C: EngineChannel> AnalysisWorker<C> {
    pub(crate) fn new(
        setup: WorkerSetup,
        channel: C,
        shared: Arc<WorkerShared>,
        events: UnboundedSender<AnalysisEvent>,
    ) -> Self {
        let multipv = if setup.kind.uses_multipv() {
            setup.params.multipv.max(1)
        } else {
            1
        };
        Self {
            kind: setup.kind,
            engine_path: setup.engine_path,
            params: setup.params,
            multipv,
            multipv_dirty: false,
            throttle: EmissionThrottle::new(setup.config.update_interval),
            config: setup.config,
            channel,
            shared,
            events,
            phase: WorkerPhase::Created,
            target_fen: setup.fen,
            cursor: None,
            slots: SlotTable::new(multipv),
            nps: None,
            hashfull: None,
        }
    }

    pub(crate) async fn run(self) {
        let span = tracing::info_span!(
            "analysis_worker",
            task = %self.kind,
            engine = %self.engine_path
        );
        self.run_inner().instrument(span).await;
    }

    async fn run_inner(mut self) {
        tracing::info!("Analysis worker started");

        match self.start().await {
            Ok(()) => self.event_loop().await,
            Err(e) => self.fail(e),
        }
        self.shutdown().await;

        tracing::info!("Analysis worker exited");
    }

    async fn start(&mut self) -> Result<(), AnalysisError> {
        self.set_phase(WorkerPhase::Handshaking);
        self.channel
            .spawn()
            .await
            .map_err(|e| AnalysisError::from_channel(&self.engine_path, e))?;

        let lines = self
            .channel
            .initialize_uci(self.config.handshake_timeout)
            .await
            .map_err(|e| AnalysisError::from_channel(&self.engine_path, e))?;
        let identity = EngineIdentity::from_handshake(&lines);
        tracing::info!(
            name = ?identity.name,
            version = ?identity.version(),
            options = identity.options.len(),
            "Engine handshake complete"
        );
        self.emit(AnalysisEvent::EngineIdentified {
            engine_path: self.engine_path.clone(),
            identity,
        });

        self.configure().await?;
        if !self.channel.confirm_ready(self.config.ready_timeout).await {
            if !self.channel.is_alive() {
                return Err(AnalysisError::process_died(
                    &self.engine_path,
                    "engine exited during setup",
                ));
            }
            return Err(AnalysisError::HandshakeTimeout {
                engine: self.engine_path.clone(),
                expected: "readyok".to_string(),
            });
        }

        self.set_phase(WorkerPhase::Ready);
        Ok(())
    }

    /// Threads first, then MultiPV for multi-line analysis, then everything
    /// else from the task parameters.
    async fn configure(&mut self) -> Result<(), AnalysisError> {
        let mut options = vec![("Threads".to_string(), self.params.threads.to_string())];
        if self.kind.uses_multipv() {
            options.push(("MultiPV".to_string(), self.multipv.to_string()));
        }
        options.extend(
            self.params
                .options
                .iter()
                .filter(|(name, _)| {
                    !name.eq_ignore_ascii_case("threads") && !name.eq_ignore_ascii_case("multipv")
                })
                .cloned(),
        );

        for (name, value) in options {
            tracing::debug!(option = %name, value = %value, "Setting engine option");
            self.channel
                .set_option(&name, &value, false)
                .await
                .map_err(|e| self.channel_failure(e))?;
        }
        Ok(())
    }

    async fn event_loop(&mut self) {
        while self.phase != WorkerPhase::Terminated && !self.shared.shutdown_requested() {
            if let Err(e) = self.step().await {
                self.fail(e);
                return;
            }
        }
    }

    async fn step(&mut self) -> Result<(), AnalysisError> {
        self.apply_mailbox().await?;
        match self.phase {
            WorkerPhase::Ready => self.begin_search().await,
            WorkerPhase::Searching => self.poll_search().await,
            WorkerPhase::Suspended => self.poll_suspended().await,
            WorkerPhase::Created | WorkerPhase::Handshaking | WorkerPhase::Terminated => Ok(()),
        }
    }

    async fn apply_mailbox(&mut self) -> Result<(), AnalysisError> {
        let mail = self.shared.take();
        if mail.is_empty() {
            return Ok(());
        }

        if let Some(multipv) = mail.multipv {
            self.apply_multipv(multipv);
        }
        if let Some(fen) = mail.position {
            self.target_fen = fen;
        }
        match mail.control {
            Some(Control::Suspend) => self.suspend().await,
            Some(Control::Resume) => self.resume().await?,
            None => {}
        }

        if self.phase == WorkerPhase::Searching && self.needs_restart() {
            self.begin_search().await?;
        }
        Ok(())
    }

    fn apply_multipv(&mut self, multipv: u32) {
        let multipv = multipv.max(1);
        if !self.kind.uses_multipv() {
            tracing::debug!(multipv, "Ignoring MultiPV change for single-line analysis");
            return;
        }
        if multipv != self.multipv {
            self.multipv = multipv;
            self.multipv_dirty = true;
        }
    }

    /// A search for the current target with the current MultiPV is already
    /// under way unless this returns true.
    fn needs_restart(&self) -> bool {
        self.multipv_dirty
            || self
                .cursor
                .as_ref()
                .map_or(true, |cursor| cursor.fen != self.target_fen)
    }

    fn limits(&self) -> SearchLimits {
        match self.kind {
            AnalysisKind::Evaluation => SearchLimits {
                depth: 0,
                movetime_ms: self.params.movetime_ms,
            },
            AnalysisKind::ManualAnalysis => self.params.limits(),
        }
    }

    /// (Re)start the search on the target position. A `go` still in flight
    /// is stopped first.
    async fn begin_search(&mut self) -> Result<(), AnalysisError> {
        let in_flight = self.phase == WorkerPhase::Searching
            && self.cursor.as_ref().is_some_and(|cursor| cursor.go_sent);
        if in_flight {
            self.channel.stop_search().await;
            tokio::time::sleep(self.config.stop_settle).await;
        }

        if self.multipv_dirty {
            self.channel
                .set_option("MultiPV", &self.multipv.to_string(), false)
                .await
                .map_err(|e| self.channel_failure(e))?;
            self.multipv_dirty = false;
        }

        let fen = self.target_fen.clone();
        self.channel
            .set_position(&fen)
            .await
            .map_err(|e| self.channel_failure(e))?;

        self.slots.reset(self.multipv);
        self.throttle.reset();
        self.nps = None;
        self.hashfull = None;

        let limits = self.limits();
        self.channel
            .start_search(limits)
            .await
            .map_err(|e| self.channel_failure(e))?;

        tracing::debug!(fen = %fen, multipv = self.multipv, go = %limits.go_command(), "Search started");
        self.cursor = Some(SearchCursor {
            black_to_move: chess::is_black_to_move(&fen),
            fen,
            go_sent: true,
            started_at: Instant::now(),
        });
        self.set_phase(WorkerPhase::Searching);
        Ok(())
    }

    async fn poll_search(&mut self) -> Result<(), AnalysisError> {
        if !self.channel.is_alive() {
            return Err(AnalysisError::process_died(
                &self.engine_path,
                "engine process terminated unexpectedly",
            ));
        }

        if let Some(line) = self.channel.read_line(self.config.poll_interval).await {
            self.handle_line(&line).await?;
        }
        self.flush_due();
        Ok(())
    }

    async fn poll_suspended(&mut self) -> Result<(), AnalysisError> {
        if !self.channel.is_alive() {
            return Err(AnalysisError::process_died(
                &self.engine_path,
                "engine process exited while suspended",
            ));
        }

        if let Some(line) = self
            .channel
            .read_line(self.config.suspended_poll_interval)
            .await
        {
            tracing::trace!(line = %line, "Discarding output while suspended");
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), AnalysisError> {
        match parse_uci_message(line) {
            Ok(UciMessage::Info(info)) => self.handle_info(line, info),
            Ok(UciMessage::BestMove { mv, .. }) => self.handle_bestmove(&mv).await?,
            Ok(UciMessage::InfoString(text)) => tracing::trace!(text = %text, "Engine info string"),
            Ok(other) => tracing::trace!(line = ?other, "Ignoring message while searching"),
            Err(e) => tracing::debug!(error = %e, "Skipping unparseable engine line"),
        }
        Ok(())
    }

    fn handle_info(&mut self, line: &str, info: InfoLine) {
        if info.nps.is_some() {
            self.nps = info.nps;
        }
        if info.hashfull.is_some() {
            self.hashfull = info.hashfull;
        }

        let Some(cursor) = self.cursor.as_ref() else {
            return;
        };
        let Some(score) = info.score else {
            return;
        };
        let fen = cursor.fen.clone();
        let black_to_move = cursor.black_to_move;
        let in_grace = cursor.started_at.elapsed() < self.config.bestmove_grace;

        let pv = parse_pv(line, &fen, self.config.pv_moves(self.kind));
        if in_grace && pv.is_none() && !info.pv.is_empty() {
            tracing::debug!("Skipping info line from the previous search");
            return;
        }

        let slot = self.slots.resolve_slot(info.multipv);
        let principal_variation = pv.unwrap_or_default();
        if !self
            .slots
            .offer(slot, info.depth, score, principal_variation.clone())
        {
            return;
        }
        let depth = self.slots.slot(slot).map_or(0, |s| s.depth);

        let score = if black_to_move { score.negated() } else { score };
        let update = LineUpdate {
            fen,
            slot: self.kind.uses_multipv().then_some(slot),
            score_centipawns: score.centipawns,
            is_mate: score.is_mate,
            mate_distance: score.mate_distance,
            depth,
            nps: self
                .nps
                .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX)),
            hashfull: self.hashfull.map_or(-1, |h| h.min(1000) as i32),
            principal_variation,
        };

        if let Some(update) = self.throttle.offer(slot, update, Instant::now()) {
            self.emit(AnalysisEvent::Line(update));
        }
    }

    async fn handle_bestmove(&mut self, mv: &str) -> Result<(), AnalysisError> {
        let grace = self.config.bestmove_grace;
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(());
        };
        if cursor.started_at.elapsed() < grace {
            tracing::debug!(bestmove = mv, "Ignoring bestmove inside grace window");
            return Ok(());
        }
        cursor.go_sent = false;

        match self.kind {
            AnalysisKind::Evaluation => {
                tracing::debug!(bestmove = mv, "Search finished");
            }
            AnalysisKind::ManualAnalysis => {
                tracing::debug!(bestmove = mv, "Search finished, restarting");
                let limits = self.limits();
                self.channel
                    .start_search(limits)
                    .await
                    .map_err(|e| self.channel_failure(e))?;
                self.slots.reset(self.multipv);
                self.nps = None;
                self.hashfull = None;
                if let Some(cursor) = self.cursor.as_mut() {
                    cursor.go_sent = true;
                    cursor.started_at = Instant::now();
                }
            }
        }
        Ok(())
    }

    async fn suspend(&mut self) {
        match self.phase {
            WorkerPhase::Searching => {
                self.channel.stop_search().await;
                if let Some(cursor) = self.cursor.as_mut() {
                    cursor.go_sent = false;
                }
            }
            WorkerPhase::Ready => {}
            _ => return,
        }
        self.throttle.reset();
        self.set_phase(WorkerPhase::Suspended);
        tracing::info!("Analysis suspended");
    }

    /// Leave suspension. The engine must still be alive and answer
    /// `isready`; the next step then starts a search on the target.
    async fn resume(&mut self) -> Result<(), AnalysisError> {
        if self.phase != WorkerPhase::Suspended {
            return Ok(());
        }
        if !self.channel.is_alive() {
            return Err(AnalysisError::process_died(
                &self.engine_path,
                "engine process is gone, cannot resume",
            ));
        }
        if !self.channel.confirm_ready(self.config.ready_timeout).await {
            return Err(AnalysisError::process_died(
                &self.engine_path,
                "engine did not confirm ready on resume",
            ));
        }
        self.set_phase(WorkerPhase::Ready);
        tracing::info!(fen = %self.target_fen, "Analysis resumed");
        Ok(())
    }

    fn flush_due(&mut self) {
        for (_, update) in self.throttle.due(Instant::now()) {
            self.emit(AnalysisEvent::Line(update));
        }
    }

    /// Enter Terminated and report `error`. Only the first failure is
    /// reported; held results are dropped.
    fn fail(&mut self, error: AnalysisError) {
        if self.phase == WorkerPhase::Terminated {
            return;
        }
        tracing::error!(error = %error, "Analysis worker failed");
        self.throttle.reset();
        self.set_phase(WorkerPhase::Terminated);
        self.emit(AnalysisEvent::Error(error));
    }

    /// `stop`, `isready`, `quit`, wait for exit, then release the process
    /// whatever happened before.
    async fn shutdown(&mut self) {
        if self.channel.is_alive() {
            self.channel.stop_search().await;
            if !self
                .channel
                .confirm_ready(self.config.shutdown_ready_wait)
                .await
            {
                tracing::debug!("No readyok during shutdown");
            }
            self.channel.quit().await;
            if !self.channel.wait_for_exit(self.config.exit_wait).await {
                tracing::warn!("Engine did not exit after quit");
            }
        }
        self.channel.cleanup().await;
        self.set_phase(WorkerPhase::Terminated);
    }

    fn channel_failure(&self, err: ChannelError) -> AnalysisError {
        AnalysisError::from_channel(&self.engine_path, err)
    }

    fn set_phase(&mut self, phase: WorkerPhase) {
        if self.phase != phase {
            tracing::trace!(from = %self.phase, to = %phase, "Worker phase change");
        }
        self.phase = phase;
        self.shared.set_phase(phase);
    }

    fn emit(&self, event: AnalysisEvent) {
        send_event(&self.events, event);
    }
}
