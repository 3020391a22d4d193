//! What an engine says about itself during the `uci` handshake.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelError, EngineChannel};
use crate::uci::{parse_uci_message, EngineOptionDeclaration, UciMessage};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("Engine did not report its name")]
    MissingName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineIdentity {
    pub name: Option<String>,
    pub author: Option<String>,
    pub options: Vec<EngineOptionDeclaration>,
}

impl EngineIdentity {
    /// Collect `id` and `option` lines from handshake output. Lines that do
    /// not parse are skipped.
    pub fn from_handshake<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut identity = Self::default();
        for line in lines {
            match parse_uci_message(line.as_ref()) {
                Ok(UciMessage::Id { name, value }) if name == "name" => identity.name = Some(value),
                Ok(UciMessage::Id { name, value }) if name == "author" => {
                    identity.author = Some(value)
                }
                Ok(UciMessage::Option(declaration)) => identity.options.push(declaration),
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Skipping handshake line"),
            }
        }
        identity
    }

    pub fn version(&self) -> Option<String> {
        [self.author.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find_map(extract_version)
    }

    pub fn option(&self, name: &str) -> Option<&EngineOptionDeclaration> {
        self.options.iter().find(|o| o.name.eq_ignore_ascii_case(name))
    }
}

/// First `D.D` or `D.D.D` version number in `text`, with an optional leading
/// `v` dropped.
pub fn extract_version(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() || (start > 0 && bytes[start - 1].is_ascii_digit()) {
            start += 1;
            continue;
        }

        let mut end = start;
        let mut groups = 0;
        loop {
            let digits = bytes[end..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 {
                break;
            }
            end += digits;
            groups += 1;
            let more = groups < 3
                && bytes.get(end) == Some(&b'.')
                && bytes.get(end + 1).is_some_and(u8::is_ascii_digit);
            if !more {
                break;
            }
            end += 1;
        }

        if groups >= 2 {
            return Some(text[start..end].to_string());
        }
        start = end.max(start + 1);
    }
    None
}

/// Start the engine, run the handshake, read back its identity and shut it
/// down again.
pub async fn validate_engine<C: EngineChannel>(
    channel: &mut C,
    timeout: Duration,
) -> Result<EngineIdentity, IdentityError> {
    let result = handshake_identity(channel, timeout).await;

    channel.quit().await;
    channel.cleanup().await;

    if let Ok(identity) = &result {
        tracing::info!(
            name = identity.name.as_deref().unwrap_or_default(),
            version = ?identity.version(),
            options = identity.options.len(),
            "Engine validated"
        );
    }
    result
}

async fn handshake_identity<C: EngineChannel>(
    channel: &mut C,
    timeout: Duration,
) -> Result<EngineIdentity, IdentityError> {
    channel.spawn().await?;
    let lines = channel.initialize_uci(timeout).await?;
    let identity = EngineIdentity::from_handshake(&lines);
    if identity.name.is_none() {
        return Err(IdentityError::MissingName);
    }
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedChannel;

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("Stockfish 16.1"), Some("16.1".to_string()));
        assert_eq!(extract_version("Engine v2.3.4 beta"), Some("2.3.4".to_string()));
        assert_eq!(extract_version("Lc0 v0.30.0-rc1"), Some("0.30.0".to_string()));
        assert_eq!(extract_version("1.2.3.4"), Some("1.2.3".to_string()));
        assert_eq!(extract_version("Stockfish 16"), None);
        assert_eq!(extract_version("the Stockfish developers"), None);
        assert_eq!(extract_version("build 7. then 3.5"), Some("3.5".to_string()));
    }

    #[test]
    fn test_identity_from_handshake() {
        let lines = [
            "id name Stockfish 16.1",
            "id author the Stockfish developers (see AUTHORS file)",
            "",
            "option name Threads type spin default 1 min 1 max 1024",
            "option name Hash type spin default 16 min 1 max 33554432",
            "option garbage",
            "uciok",
        ];
        let identity = EngineIdentity::from_handshake(&lines);
        assert_eq!(identity.name.as_deref(), Some("Stockfish 16.1"));
        assert_eq!(identity.options.len(), 2);
        assert_eq!(identity.version(), Some("16.1".to_string()));
        assert!(identity.option("hash").is_some());
    }

    #[test]
    fn test_version_prefers_author() {
        let identity = EngineIdentity {
            name: Some("Engine 1.0".to_string()),
            author: Some("Team v2.5".to_string()),
            options: Vec::new(),
        };
        assert_eq!(identity.version(), Some("2.5".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_engine() {
        let (mut channel, script) = ScriptedChannel::new();
        script.set_identity("Stockfish 16.1", "the Stockfish developers");
        script.declare_option("option name Hash type spin default 16 min 1 max 33554432");

        let identity = validate_engine(&mut channel, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(identity.options.len(), 1);
        assert_eq!(script.cleanup_count(), 1);
        assert!(!script.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_engine_without_name() {
        let (mut channel, script) = ScriptedChannel::new();
        script.clear_identity();

        let err = validate_engine(&mut channel, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::MissingName));
        assert_eq!(script.cleanup_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_engine_without_uciok() {
        let (mut channel, script) = ScriptedChannel::new();
        script.set_handshake_silent(true);

        let err = validate_engine(&mut channel, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IdentityError::Channel(ChannelError::HandshakeTimeout { .. })
        ));
    }
}
