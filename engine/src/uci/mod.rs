pub mod options;
pub mod parser;

pub use options::{parse_option_declaration, EngineOptionDeclaration, OptionDefault, OptionType};
pub use parser::{
    parse_depth, parse_hashfull, parse_multipv, parse_nps, parse_pv, parse_pv_moves, parse_score,
    parse_uci_message, InfoLine, ParsedScore, UciMessage,
};

#[derive(Debug, thiserror::Error)]
pub enum UciError {
    #[error("Empty UCI message")]
    Empty,
    #[error("Malformed UCI message: {0}")]
    MalformedMessage(String),
    #[error("Unknown UCI message: {0}")]
    UnknownMessage(String),
}
