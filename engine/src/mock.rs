//! A scripted in-memory engine for tests.
//!
//! [`ScriptedChannel`] answers `uci` and `isready` on its own and otherwise
//! replays whatever lines the test queues through its [`ScriptHandle`]. Every
//! command sent to it is recorded so tests can assert on the exact UCI
//! conversation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::{ChannelError, ChannelFactory, EngineChannel};

#[derive(Debug)]
struct ScriptState {
    label: String,
    sent: Vec<String>,
    incoming: VecDeque<String>,
    alive: bool,
    spawn_fails: bool,
    handshake_silent: bool,
    ready_silent: bool,
    id_name: Option<String>,
    id_author: Option<String>,
    declarations: Vec<String>,
    bestmove_on_stop: Option<String>,
    cleanups: usize,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            label: "mock".to_string(),
            sent: Vec::new(),
            incoming: VecDeque::new(),
            alive: false,
            spawn_fails: false,
            handshake_silent: false,
            ready_silent: false,
            id_name: Some("MockEngine 1.0".to_string()),
            id_author: Some("Test Suite".to_string()),
            declarations: Vec::new(),
            bestmove_on_stop: None,
            cleanups: 0,
        }
    }
}

/// Test-side control of a [`ScriptedChannel`]. Cheap to clone and safe to
/// use from another thread while the channel runs inside a worker.
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue one line of engine output.
    pub fn push_line(&self, line: &str) {
        self.lock().incoming.push_back(line.to_string());
    }

    pub fn push_lines(&self, lines: &[&str]) {
        let mut state = self.lock();
        state
            .incoming
            .extend(lines.iter().map(|line| line.to_string()));
    }

    /// Every command sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Number of sent commands starting with `prefix`.
    pub fn count_sent(&self, prefix: &str) -> usize {
        self.lock()
            .sent
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .count()
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// Simulate the engine process dying.
    pub fn kill(&self) {
        let mut state = self.lock();
        state.alive = false;
        state.incoming.clear();
    }

    pub fn is_alive(&self) -> bool {
        self.lock().alive
    }

    pub fn label(&self) -> String {
        self.lock().label.clone()
    }

    pub fn cleanup_count(&self) -> usize {
        self.lock().cleanups
    }

    pub fn fail_spawn(&self, fails: bool) {
        self.lock().spawn_fails = fails;
    }

    /// Stop answering `uci` with `uciok`.
    pub fn set_handshake_silent(&self, silent: bool) {
        self.lock().handshake_silent = silent;
    }

    /// Stop answering `isready` with `readyok`.
    pub fn set_ready_silent(&self, silent: bool) {
        self.lock().ready_silent = silent;
    }

    pub fn set_identity(&self, name: &str, author: &str) {
        let mut state = self.lock();
        state.id_name = Some(name.to_string());
        state.id_author = Some(author.to_string());
    }

    pub fn clear_identity(&self) {
        let mut state = self.lock();
        state.id_name = None;
        state.id_author = None;
    }

    /// Add an `option name ...` line to the handshake reply.
    pub fn declare_option(&self, declaration: &str) {
        self.lock().declarations.push(declaration.to_string());
    }

    /// Reply to every `stop` with this bestmove line.
    pub fn set_bestmove_on_stop(&self, mv: Option<&str>) {
        self.lock().bestmove_on_stop = mv.map(|mv| format!("bestmove {mv}"));
    }
}

#[derive(Debug)]
pub struct ScriptedChannel {
    script: ScriptHandle,
}

impl ScriptedChannel {
    pub fn new() -> (Self, ScriptHandle) {
        let script = ScriptHandle::default();
        (
            Self {
                script: script.clone(),
            },
            script,
        )
    }

    pub fn with_script(script: ScriptHandle) -> Self {
        Self { script }
    }
}

#[async_trait]
impl EngineChannel for ScriptedChannel {
    async fn spawn(&mut self) -> Result<(), ChannelError> {
        let mut state = self.script.lock();
        if state.spawn_fails {
            return Err(ChannelError::Spawn {
                path: state.label.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such engine"),
            });
        }
        state.alive = true;
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<(), ChannelError> {
        let mut state = self.script.lock();
        if !state.alive {
            return Err(ChannelError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "engine is gone",
            )));
        }
        state.sent.push(command.to_string());

        match command {
            "uci" if !state.handshake_silent => {
                let mut reply = Vec::new();
                if let Some(name) = &state.id_name {
                    reply.push(format!("id name {name}"));
                }
                if let Some(author) = &state.id_author {
                    reply.push(format!("id author {author}"));
                }
                reply.extend(state.declarations.iter().cloned());
                reply.push("uciok".to_string());
                state.incoming.extend(reply);
            }
            "isready" if !state.ready_silent => state.incoming.push_back("readyok".to_string()),
            "stop" => {
                if let Some(line) = state.bestmove_on_stop.clone() {
                    state.incoming.push_back(line);
                }
            }
            "quit" => state.alive = false,
            _ => {}
        }
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Option<String> {
        if let Some(line) = self.script.lock().incoming.pop_front() {
            return Some(line);
        }
        tokio::time::sleep(timeout).await;
        self.script.lock().incoming.pop_front()
    }

    fn is_alive(&mut self) -> bool {
        self.script.lock().alive
    }

    async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        if !self.script.lock().alive {
            return true;
        }
        tokio::time::sleep(timeout).await;
        !self.script.lock().alive
    }

    async fn cleanup(&mut self) {
        let mut state = self.script.lock();
        state.cleanups += 1;
        state.alive = false;
        state.incoming.clear();
    }
}

type ScriptTemplate = Box<dyn Fn(&ScriptHandle) + Send + Sync>;

/// Hands out [`ScriptedChannel`]s. Each created channel gets a fresh script,
/// which is also pushed onto [`ScriptedFactory::scripts`] so tests can reach
/// engines created deep inside the supervisor.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    scripts: Arc<Mutex<Vec<ScriptHandle>>>,
    template: Arc<Mutex<Option<ScriptTemplate>>>,
}

impl std::fmt::Debug for ScriptedFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedFactory")
            .field("created", &self.created())
            .finish_non_exhaustive()
    }
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `configure` on every script this factory creates from now on.
    pub fn configure_each(&self, configure: impl Fn(&ScriptHandle) + Send + Sync + 'static) {
        *self.template.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(configure));
    }

    /// Scripts of all channels created so far, oldest first.
    pub fn scripts(&self) -> Vec<ScriptHandle> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn created(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ChannelFactory for ScriptedFactory {
    type Channel = ScriptedChannel;

    fn create(&self, engine_path: &str, label: &str) -> ScriptedChannel {
        let script = ScriptHandle::default();
        script.lock().label = format!("{label}:{engine_path}");
        if let Some(configure) = self
            .template
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            configure(&script);
        }
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(script.clone());
        ScriptedChannel::with_script(script)
    }
}
