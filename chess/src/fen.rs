use cozy_chess::Board;

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    if fen.split_whitespace().next().is_none() {
        return Err(FenError::Empty);
    }

    fen.parse().map_err(|_| FenError::InvalidFormat(fen.to_string()))
}

/// Whether the side-to-move field of a FEN names Black.
///
/// Only the second field is inspected, so this works even for positions the
/// board library would reject. Anything other than `b` counts as White.
pub fn is_black_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) == Some("b")
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Empty FEN")]
    Empty,
    #[error("Invalid FEN: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_parse_start_position() {
        let board = parse_fen(START_FEN).unwrap();
        assert_eq!(board.to_string(), START_FEN);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_fen("   "), Err(FenError::Empty)));
        assert!(matches!(
            parse_fen("not a fen"),
            Err(FenError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_black_to_move_after_e4() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        assert!(is_black_to_move(fen));
    }

    #[test]
    fn test_white_to_move() {
        assert!(!is_black_to_move(START_FEN));
    }

    #[test]
    fn test_malformed_defaults_to_white() {
        assert!(!is_black_to_move(""));
        assert!(!is_black_to_move("8/8/8/8/8/8/8/8"));
    }
}
