//! UCI engine plumbing: the process channel, the line parser and the
//! metadata an engine declares during its handshake.

pub mod channel;
pub mod identity;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod process;
pub mod uci;

pub use channel::{
    ChannelError, ChannelFactory, EngineChannel, SearchLimits, DEFAULT_READY_TIMEOUT,
};
pub use identity::{extract_version, validate_engine, EngineIdentity, IdentityError};
pub use process::{UciChannel, UciChannelFactory};
pub use uci::{
    parse_option_declaration, parse_uci_message, EngineOptionDeclaration, InfoLine, OptionDefault,
    OptionType, ParsedScore, UciError, UciMessage,
};
