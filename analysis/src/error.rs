use engine::ChannelError;

/// Coarse classification of fatal analysis failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SpawnFailure,
    HandshakeTimeout,
    ProcessDied,
}

/// A failure that ends a worker. Every variant names the engine and carries
/// the underlying cause as text so it can travel through event channels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to start engine {engine}: {cause}")]
    SpawnFailure { engine: String, cause: String },
    #[error("Engine {engine} did not answer {expected} in time")]
    HandshakeTimeout { engine: String, expected: String },
    #[error("Engine {engine} stopped responding: {cause}")]
    ProcessDied { engine: String, cause: String },
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SpawnFailure { .. } => ErrorKind::SpawnFailure,
            Self::HandshakeTimeout { .. } => ErrorKind::HandshakeTimeout,
            Self::ProcessDied { .. } => ErrorKind::ProcessDied,
        }
    }

    pub fn engine(&self) -> &str {
        match self {
            Self::SpawnFailure { engine, .. }
            | Self::HandshakeTimeout { engine, .. }
            | Self::ProcessDied { engine, .. } => engine,
        }
    }

    pub fn process_died(engine: &str, cause: impl Into<String>) -> Self {
        Self::ProcessDied {
            engine: engine.to_string(),
            cause: cause.into(),
        }
    }

    /// Map a channel failure onto the fatal taxonomy. Write failures mean the
    /// pipe is gone, which is treated as the process having died.
    pub fn from_channel(engine: &str, err: ChannelError) -> Self {
        match err {
            ChannelError::Spawn { source, .. } => Self::SpawnFailure {
                engine: engine.to_string(),
                cause: source.to_string(),
            },
            ChannelError::HandshakeTimeout { expected, .. } => Self::HandshakeTimeout {
                engine: engine.to_string(),
                expected: expected.to_string(),
            },
            other @ (ChannelError::NotRunning
            | ChannelError::Write(_)
            | ChannelError::MissingPipe(_)) => Self::process_died(engine, other.to_string()),
        }
    }
}
