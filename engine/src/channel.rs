//! The transport seam between an analysis worker and a UCI engine.
//!
//! [`EngineChannel`] has a small set of required primitives (spawn, send a
//! line, read a line with a timeout, liveness, exit wait and cleanup). The
//! UCI conversation itself (handshake, options, positions, searches) is built
//! on top of those primitives as provided methods, so the real process
//! channel and the scripted test channel speak exactly the same protocol.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Default deadline for `readyok` after `isready`.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single read while waiting for a handshake reply, so that
/// liveness is re-checked regularly.
const HANDSHAKE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to spawn engine {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine process is not running")]
    NotRunning,
    #[error("Failed to write to engine: {0}")]
    Write(#[source] std::io::Error),
    #[error("Engine has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("Timed out after {timeout:?} waiting for {expected}")]
    HandshakeTimeout {
        expected: &'static str,
        timeout: Duration,
    },
}

/// Search limits for a `go` command. Zero means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: u32,
    pub movetime_ms: u64,
}

impl SearchLimits {
    pub fn infinite() -> Self {
        Self::default()
    }

    pub fn is_infinite(&self) -> bool {
        self.depth == 0 && self.movetime_ms == 0
    }

    /// The `go` command line for these limits.
    pub fn go_command(&self) -> String {
        match (self.depth, self.movetime_ms) {
            (0, 0) => "go infinite".to_string(),
            (depth, 0) => format!("go depth {depth}"),
            (0, movetime) => format!("go movetime {movetime}"),
            (depth, movetime) => format!("go depth {depth} movetime {movetime}"),
        }
    }
}

#[async_trait]
pub trait EngineChannel: Send {
    /// Launch the engine process. Fails with [`ChannelError::Spawn`] when the
    /// executable cannot be started.
    async fn spawn(&mut self) -> Result<(), ChannelError>;

    /// Write one command line to the engine.
    async fn send(&mut self, command: &str) -> Result<(), ChannelError>;

    /// Next line of engine output, or `None` if nothing arrives within
    /// `timeout`. Never blocks past the timeout.
    async fn read_line(&mut self, timeout: Duration) -> Option<String>;

    /// Whether the process is still running.
    fn is_alive(&mut self) -> bool;

    /// Wait up to `timeout` for the process to exit on its own.
    async fn wait_for_exit(&mut self, timeout: Duration) -> bool;

    /// Release the process and its pipes. Safe to call more than once.
    async fn cleanup(&mut self);

    /// Send `uci` and collect every line up to and including `uciok`.
    async fn initialize_uci(&mut self, timeout: Duration) -> Result<Vec<String>, ChannelError> {
        self.send("uci").await?;

        let deadline = Instant::now() + timeout;
        let mut lines = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ChannelError::HandshakeTimeout {
                    expected: "uciok",
                    timeout,
                });
            }
            if !self.is_alive() {
                return Err(ChannelError::NotRunning);
            }
            if let Some(line) = self.read_line((deadline - now).min(HANDSHAKE_POLL)).await {
                let done = line == "uciok";
                lines.push(line);
                if done {
                    return Ok(lines);
                }
            }
        }
    }

    async fn set_option(
        &mut self,
        name: &str,
        value: &str,
        wait_for_ready: bool,
    ) -> Result<(), ChannelError> {
        self.send(&format!("setoption name {name} value {value}"))
            .await?;
        if wait_for_ready && !self.confirm_ready(DEFAULT_READY_TIMEOUT).await {
            return Err(ChannelError::HandshakeTimeout {
                expected: "readyok",
                timeout: DEFAULT_READY_TIMEOUT,
            });
        }
        Ok(())
    }

    async fn set_position(&mut self, fen: &str) -> Result<(), ChannelError> {
        self.send(&format!("position fen {fen}")).await
    }

    async fn start_search(&mut self, limits: SearchLimits) -> Result<(), ChannelError> {
        self.send(&limits.go_command()).await
    }

    /// Ask the engine to stop searching. Write failures are logged only; a
    /// dead engine is noticed by the next liveness check.
    async fn stop_search(&mut self) {
        if let Err(e) = self.send("stop").await {
            tracing::debug!(error = %e, "Failed to send stop");
        }
    }

    /// Send `isready` and wait for `readyok`. Output that arrives in the
    /// meantime (late `info` or `bestmove` lines) is discarded.
    async fn confirm_ready(&mut self, timeout: Duration) -> bool {
        if self.send("isready").await.is_err() {
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(?timeout, "No readyok before deadline");
                return false;
            }
            if !self.is_alive() {
                return false;
            }
            match self.read_line((deadline - now).min(HANDSHAKE_POLL)).await {
                Some(line) if line == "readyok" => return true,
                Some(line) => tracing::trace!(line = %line, "Discarded while awaiting readyok"),
                None => {}
            }
        }
    }

    async fn quit(&mut self) {
        if let Err(e) = self.send("quit").await {
            tracing::debug!(error = %e, "Failed to send quit");
        }
    }
}

/// Builds a fresh, not yet spawned channel for an engine executable.
pub trait ChannelFactory: Send + Sync + 'static {
    type Channel: EngineChannel + 'static;

    fn create(&self, engine_path: &str, label: &str) -> Self::Channel;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedChannel;

    #[test]
    fn test_go_command_variants() {
        assert_eq!(SearchLimits::infinite().go_command(), "go infinite");
        let depth = SearchLimits {
            depth: 20,
            movetime_ms: 0,
        };
        assert_eq!(depth.go_command(), "go depth 20");
        let movetime = SearchLimits {
            depth: 0,
            movetime_ms: 1000,
        };
        assert_eq!(movetime.go_command(), "go movetime 1000");
        let both = SearchLimits {
            depth: 40,
            movetime_ms: 1000,
        };
        assert_eq!(both.go_command(), "go depth 40 movetime 1000");
        assert!(!both.is_infinite());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_uci_collects_until_uciok() {
        let (mut channel, script) = ScriptedChannel::new();
        script.set_identity("Stockfish 16.1", "the Stockfish developers");
        channel.spawn().await.unwrap();

        let lines = channel
            .initialize_uci(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(lines.first().map(String::as_str), Some("id name Stockfish 16.1"));
        assert_eq!(lines.last().map(String::as_str), Some("uciok"));
        assert_eq!(script.sent(), vec!["uci"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_uci_times_out() {
        let (mut channel, script) = ScriptedChannel::new();
        script.set_handshake_silent(true);
        channel.spawn().await.unwrap();

        let err = channel
            .initialize_uci(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::HandshakeTimeout {
                expected: "uciok",
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_ready_discards_stale_output() {
        let (mut channel, script) = ScriptedChannel::new();
        channel.spawn().await.unwrap();
        script.push_line("info depth 3 score cp 10 pv e2e4");
        script.push_line("bestmove e2e4");

        assert!(channel.confirm_ready(Duration::from_secs(1)).await);
        assert!(channel.read_line(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_ready_fails_on_dead_engine() {
        let (mut channel, script) = ScriptedChannel::new();
        channel.spawn().await.unwrap();
        script.kill();

        assert!(!channel.confirm_ready(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_option_formats_command() {
        let (mut channel, script) = ScriptedChannel::new();
        channel.spawn().await.unwrap();

        channel.set_option("Hash", "256", true).await.unwrap();
        channel.set_option("MultiPV", "3", false).await.unwrap();
        assert_eq!(
            script.sent(),
            vec![
                "setoption name Hash value 256",
                "isready",
                "setoption name MultiPV value 3",
            ]
        );
    }
}
