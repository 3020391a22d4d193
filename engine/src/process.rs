use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{ChannelError, ChannelFactory, EngineChannel};

/// How long `cleanup` waits for a polite `quit` before killing the process.
const CLEANUP_EXIT_WAIT: Duration = Duration::from_secs(2);

/// A UCI engine running as a child process, talking over its stdin/stdout.
///
/// Output is pumped line by line into an unbounded queue by a reader task,
/// so `read_line` is a bounded wait on that queue and never on the pipe
/// itself.
pub struct UciChannel {
    path: String,
    label: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: Option<mpsc::UnboundedReceiver<String>>,
    reader: Option<JoinHandle<()>>,
    exit_logged: bool,
}

impl UciChannel {
    pub fn new(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            child: None,
            stdin: None,
            lines: None,
            reader: None,
            exit_logged: false,
        }
    }
}

#[async_trait]
impl EngineChannel for UciChannel {
    async fn spawn(&mut self) -> Result<(), ChannelError> {
        tracing::debug!(path = %self.path, label = %self.label, "Spawning engine process");
        let mut child = tokio::process::Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                tracing::error!(path = %self.path, error = %source, "Failed to spawn engine");
                ChannelError::Spawn {
                    path: self.path.clone(),
                    source,
                }
            })?;

        let stdin = child.stdin.take().ok_or(ChannelError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ChannelError::MissingPipe("stdout"))?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let label = self.label.clone();
        let reader = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::debug!(label = %label, "Engine stdout EOF");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        tracing::trace!(label = %label, "UCI << {}", trimmed);
                        if line_tx.send(trimmed.to_string()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(label = %label, error = %e, "Error reading engine stdout");
                        break;
                    }
                }
            }
        });

        tracing::info!(label = %self.label, pid = ?child.id(), "Engine process started");
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.lines = Some(line_rx);
        self.reader = Some(reader);
        self.exit_logged = false;
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<(), ChannelError> {
        let stdin = self.stdin.as_mut().ok_or(ChannelError::NotRunning)?;
        tracing::trace!(label = %self.label, "UCI >> {}", command);
        stdin
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(ChannelError::Write)?;
        stdin.flush().await.map_err(ChannelError::Write)
    }

    async fn read_line(&mut self, timeout: Duration) -> Option<String> {
        let Some(lines) = self.lines.as_mut() else {
            tokio::time::sleep(timeout).await;
            return None;
        };

        match tokio::time::timeout(timeout, lines.recv()).await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                // Reader finished; later reads just wait out their timeout.
                self.lines = None;
                None
            }
            Err(_) => None,
        }
    }

    fn is_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if !self.exit_logged {
                    tracing::warn!(label = %self.label, %status, "Engine process exited");
                    self.exit_logged = true;
                }
                false
            }
            Err(e) => {
                tracing::warn!(label = %self.label, error = %e, "Failed to poll engine process");
                false
            }
        }
    }

    async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        matches!(tokio::time::timeout(timeout, child.wait()).await, Ok(Ok(_)))
    }

    async fn cleanup(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if matches!(child.try_wait(), Ok(None)) {
            if let Some(mut stdin) = self.stdin.take() {
                let _ = stdin.write_all(b"quit\n").await;
                let _ = stdin.flush().await;
                // Dropping stdin closes the pipe, which also ends most engines.
            }
            if tokio::time::timeout(CLEANUP_EXIT_WAIT, child.wait())
                .await
                .is_err()
            {
                tracing::warn!(label = %self.label, "Engine ignored quit, killing");
                if let Err(e) = child.kill().await {
                    tracing::error!(label = %self.label, error = %e, "Failed to kill engine");
                }
            }
        }

        self.stdin = None;
        self.lines = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        tracing::info!(label = %self.label, "Engine process cleaned up");
    }
}

/// Creates [`UciChannel`]s for real engine executables.
#[derive(Debug, Clone, Copy, Default)]
pub struct UciChannelFactory;

impl ChannelFactory for UciChannelFactory {
    type Channel = UciChannel;

    fn create(&self, engine_path: &str, label: &str) -> UciChannel {
        UciChannel::new(engine_path, label)
    }
}
