//! Interactive analysis: positions and commands come in on stdin, analysis
//! lines go out on stdout.

use std::sync::Arc;
use std::time::Duration;

use analysis::{
    AnalysisConfig, AnalysisEvent, AnalysisKind, AnalysisSupervisor, JsonParameterStore,
    LineUpdate,
};
use anyhow::{bail, Context};
use engine::UciChannelFactory;
use tokio::io::{AsyncBufReadExt, BufReader};

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Position(String),
    MultiPv(u32),
    Suspend,
    Resume,
    /// Re-read stored parameters and restart the engine with them.
    Reload,
    Quit,
}

/// Parse a line of input. Blank lines yield `None`; a bare FEN is accepted
/// as a position.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match word {
        "startpos" => Command::Position(START_FEN.to_string()),
        "fen" => Command::Position(checked_fen(rest)?),
        "multipv" => {
            let n: u32 = rest
                .parse()
                .with_context(|| format!("invalid MultiPV count: {rest:?}"))?;
            if n == 0 {
                bail!("MultiPV must be at least 1");
            }
            Command::MultiPv(n)
        }
        "suspend" | "pause" => Command::Suspend,
        "resume" => Command::Resume,
        "reload" => Command::Reload,
        "quit" | "exit" => Command::Quit,
        _ if line.contains('/') => Command::Position(checked_fen(line)?),
        _ => bail!("unknown command: {word}"),
    };
    Ok(Some(command))
}

fn checked_fen(fen: &str) -> anyhow::Result<String> {
    chess::parse_fen(fen).with_context(|| format!("invalid FEN: {fen}"))?;
    Ok(fen.to_string())
}

pub struct AnalysisSession {
    engine: String,
    supervisor: AnalysisSupervisor<UciChannelFactory>,
    store: Arc<JsonParameterStore>,
    current: Option<String>,
}

impl AnalysisSession {
    pub fn new(
        engine: String,
        kind: AnalysisKind,
        store: Arc<JsonParameterStore>,
        config: AnalysisConfig,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<AnalysisEvent>) {
        let (supervisor, events) =
            AnalysisSupervisor::new(kind, store.clone(), UciChannelFactory, config);
        let session = Self {
            engine,
            supervisor,
            store,
            current: None,
        };
        (session, events)
    }

    pub fn set_multipv(&mut self, multipv: u32) {
        self.supervisor.set_multipv(multipv);
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Position(fen) => {
                self.analyse(&fen);
                self.current = Some(fen);
            }
            Command::MultiPv(n) => self.supervisor.set_multipv(n),
            Command::Suspend => self.supervisor.suspend(),
            Command::Resume => self.analyse_current(),
            Command::Reload => {
                self.store.reload();
                self.supervisor.invalidate();
                self.analyse_current();
            }
            Command::Quit => {}
        }
    }

    fn analyse_current(&mut self) {
        match self.current.clone() {
            Some(fen) => self.analyse(&fen),
            None => eprintln!("no position yet"),
        }
    }

    fn analyse(&mut self, fen: &str) {
        match self.supervisor.request(&self.engine, fen) {
            Ok(action) => tracing::debug!(?action, fen = %fen, "Analysis requested"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    /// Stop the engine, waiting a bounded time for it to exit.
    pub async fn close(self) -> anyhow::Result<()> {
        let mut supervisor = self.supervisor;
        let stopped = tokio::task::spawn_blocking(move || supervisor.shutdown(SHUTDOWN_TIMEOUT))
            .await
            .context("shutdown task failed")?;
        if !stopped {
            tracing::warn!("Engine did not shut down in time");
        }
        Ok(())
    }
}

/// Run until `quit` or end of input.
pub async fn run(
    mut session: AnalysisSession,
    mut events: tokio::sync::mpsc::UnboundedReceiver<AnalysisEvent>,
    initial: Option<String>,
) -> anyhow::Result<()> {
    if let Some(fen) = initial {
        session.apply(Command::Position(checked_fen(&fen)?));
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => session.apply(command),
                    Ok(None) => {}
                    Err(e) => eprintln!("{e:#}"),
                }
            }
            Some(event) = events.recv() => print_event(&event),
        }
    }

    session.close().await
}

fn print_event(event: &AnalysisEvent) {
    match event {
        AnalysisEvent::Error(e) => eprintln!("error: {e}"),
        other => println!("{}", format_event(other)),
    }
}

pub fn format_event(event: &AnalysisEvent) -> String {
    match event {
        AnalysisEvent::EngineIdentified {
            engine_path,
            identity,
        } => format!(
            "engine {} {}",
            identity.name.as_deref().unwrap_or(engine_path),
            identity
                .author
                .as_deref()
                .map(|author| format!("by {author}"))
                .unwrap_or_default()
        )
        .trim_end()
        .to_string(),
        AnalysisEvent::Line(update) => format_line(update),
        AnalysisEvent::Error(e) => format!("error {e}"),
    }
}

/// `[2] depth 18 +0.31 nps 1200000 hashfull 12 | e4 e5 Nf3`
pub fn format_line(update: &LineUpdate) -> String {
    let mut out = String::new();
    if let Some(slot) = update.slot {
        out.push_str(&format!("[{slot}] "));
    }
    out.push_str(&format!("depth {} {}", update.depth, format_score(update)));
    if update.nps >= 0 {
        out.push_str(&format!(" nps {}", update.nps));
    }
    if update.hashfull >= 0 {
        out.push_str(&format!(" hashfull {}", update.hashfull));
    }
    if !update.principal_variation.is_empty() {
        out.push_str(" | ");
        out.push_str(&update.principal_variation);
    }
    out
}

fn format_score(update: &LineUpdate) -> String {
    if update.is_mate {
        format!("#{}", update.mate_distance)
    } else {
        format!("{:+.2}", update.score_centipawns / 100.0)
    }
}
