//! Board-side helpers used by the analysis pipeline.
//!
//! Everything here is a thin layer over `cozy-chess`: reading the side to move
//! out of a FEN, converting UCI move text into board moves, and rendering
//! moves and whole principal variations in Standard Algebraic Notation.

pub mod fen;
pub mod san;
pub mod uci;

pub use fen::{is_black_to_move, parse_fen, FenError};
pub use san::{format_san, uci_line_to_san};
pub use uci::{convert_uci_castling_to_cozy, format_uci_move, parse_uci_move, ChessError};
