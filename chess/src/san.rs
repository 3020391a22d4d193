//! Standard Algebraic Notation rendering.

use cozy_chess::{Board, GameStatus, Move, Piece};

use crate::fen::{parse_fen, FenError};
use crate::uci::{
    convert_uci_castling_to_cozy, file_char, format_square, parse_uci_move, piece_letter, rank_char,
};

/// Format a legal move (in cozy_chess notation) as SAN, including the
/// disambiguation, capture, promotion and check/mate markers.
pub fn format_san(board: &Board, mv: Move) -> String {
    let legal = legal_moves(board);
    san_with_legal(board, mv, &legal)
}

/// Replay a principal variation given in UCI move text and render it as SAN.
///
/// At most `max_moves` moves are converted. The first token that is not a
/// well-formed, legal move truncates the line, so the result never contains an
/// illegal continuation. Fails only when the FEN itself cannot be parsed.
pub fn uci_line_to_san<S: AsRef<str>>(
    fen: &str,
    uci_moves: &[S],
    max_moves: usize,
) -> Result<Vec<String>, FenError> {
    let mut board = parse_fen(fen)?;
    let mut line = Vec::new();

    for text in uci_moves.iter().take(max_moves) {
        let Ok(mv) = parse_uci_move(text.as_ref()) else {
            break;
        };
        let legal = legal_moves(&board);
        let mv = convert_uci_castling_to_cozy(mv, &legal);
        if !legal.contains(&mv) {
            break;
        }
        line.push(san_with_legal(&board, mv, &legal));
        board.play_unchecked(mv);
    }

    Ok(line)
}

fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

fn san_with_legal(board: &Board, mv: Move, legal: &[Move]) -> String {
    let side = board.side_to_move();
    let Some(piece) = board.piece_on(mv.from) else {
        return format!("{}{}", format_square(mv.from), format_square(mv.to));
    };

    let mut san = String::new();

    if piece == Piece::King && board.color_on(mv.to) == Some(side) {
        // cozy_chess encodes castling as the king capturing its own rook
        if mv.to.file() as u8 > mv.from.file() as u8 {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else {
        let is_capture = board.color_on(mv.to).is_some_and(|c| c != side)
            || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

        if piece == Piece::Pawn {
            if is_capture {
                san.push(file_char(mv.from.file()));
            }
        } else {
            san.push(piece_letter(piece));
            san.push_str(&disambiguation(board, mv, piece, legal));
        }

        if is_capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(piece_letter(promo));
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if after.status() == GameStatus::Won {
        san.push('#');
    } else if !after.checkers().is_empty() {
        san.push('+');
    }

    san
}

fn disambiguation(board: &Board, mv: Move, piece: Piece, legal: &[Move]) -> String {
    let rivals: Vec<Move> = legal
        .iter()
        .copied()
        .filter(|m| m.to == mv.to && m.from != mv.from && board.piece_on(m.from) == Some(piece))
        .collect();

    if rivals.is_empty() {
        return String::new();
    }

    let shares_file = rivals.iter().any(|m| m.from.file() == mv.from.file());
    let shares_rank = rivals.iter().any(|m| m.from.rank() == mv.from.rank());

    if !shares_file {
        file_char(mv.from.file()).to_string()
    } else if !shares_rank {
        rank_char(mv.from.rank()).to_string()
    } else {
        format_square(mv.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn san(fen: &str, uci: &str) -> String {
        let board = parse_fen(fen).unwrap();
        let legal = legal_moves(&board);
        let mv = convert_uci_castling_to_cozy(parse_uci_move(uci).unwrap(), &legal);
        format_san(&board, mv)
    }

    #[test]
    fn test_san_pawn_push() {
        assert_eq!(san(START_FEN, "e2e4"), "e4");
    }

    #[test]
    fn test_san_knight() {
        assert_eq!(san(START_FEN, "g1f3"), "Nf3");
    }

    #[test]
    fn test_san_capture() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2";
        assert_eq!(san(fen, "e4d5"), "exd5");
    }

    #[test]
    fn test_san_en_passant() {
        let fen = "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3";
        assert_eq!(san(fen, "e5f6"), "exf6");
    }

    #[test]
    fn test_san_castling_both_notations() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        assert_eq!(san(fen, "e1g1"), "O-O");
        assert_eq!(san(fen, "e1h1"), "O-O");
        assert_eq!(san(fen, "e1c1"), "O-O-O");
    }

    #[test]
    fn test_san_promotion() {
        let fen = "8/P7/8/8/8/8/8/4K2k w - - 0 1";
        assert_eq!(san(fen, "a7a8q"), "a8=Q");
    }

    #[test]
    fn test_san_file_disambiguation() {
        // Knights on b1 and f1 can both reach d2
        let fen = "4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1";
        assert_eq!(san(fen, "b1d2"), "Nbd2");
    }

    #[test]
    fn test_san_rank_disambiguation() {
        // Rooks on a1 and a5 can both reach a3
        let fen = "4k3/8/8/R7/8/8/8/R3K3 w - - 0 1";
        assert_eq!(san(fen, "a1a3"), "R1a3");
    }

    #[test]
    fn test_san_check_and_mate() {
        let fen = "4k3/8/8/8/8/8/8/R3K3 w - - 0 1";
        assert_eq!(san(fen, "a1a8"), "Ra8+");
        // Fool's mate
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2";
        assert_eq!(san(fen, "d8h4"), "Qh4#");
    }

    #[test]
    fn test_line_to_san() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let line = uci_line_to_san(fen, &["e7e5", "g1f3", "b8c6"], 10).unwrap();
        assert_eq!(line, vec!["e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_line_truncates_at_illegal_move() {
        let line = uci_line_to_san(START_FEN, &["e2e4", "e2e4", "e7e5"], 10).unwrap();
        assert_eq!(line, vec!["e4"]);
    }

    #[test]
    fn test_line_truncates_at_malformed_token() {
        let line = uci_line_to_san(START_FEN, &["e2e4", "xyz", "e7e5"], 10).unwrap();
        assert_eq!(line, vec!["e4"]);
    }

    #[test]
    fn test_line_respects_cap() {
        let line = uci_line_to_san(START_FEN, &["e2e4", "e7e5", "g1f3"], 2).unwrap();
        assert_eq!(line, vec!["e4", "e5"]);
    }

    #[test]
    fn test_line_invalid_fen() {
        assert!(uci_line_to_san("not a fen", &["e2e4"], 5).is_err());
    }
}
