//! UCI (Universal Chess Interface) move text

use cozy_chess::{File, Move, Piece, Rank, Square};

#[derive(Debug, thiserror::Error)]
pub enum ChessError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

/// Parse a move in UCI coordinate notation, like `e2e4` or `e7e8q`.
pub fn parse_uci_move(s: &str) -> Result<Move, ChessError> {
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(ChessError::InvalidMove(s.to_string()));
    }

    let promotion = match s[4..].chars().next() {
        None => None,
        Some(c) => match Piece::try_from(c) {
            Ok(piece @ (Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen)) => Some(piece),
            _ => return Err(ChessError::InvalidPromotion(s.to_string())),
        },
    };

    Ok(Move {
        from: parse_square(&s[0..2])?,
        to: parse_square(&s[2..4])?,
        promotion,
    })
}

fn parse_square(s: &str) -> Result<Square, ChessError> {
    let invalid = || ChessError::InvalidSquare(s.to_string());
    let mut chars = s.chars();
    let (Some(f), Some(r), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(invalid());
    };
    let file = File::try_from(f).map_err(|_| invalid())?;
    let rank = Rank::try_from(r).map_err(|_| invalid())?;
    Ok(Square::new(file, rank))
}

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// The converted move is only returned when it is present in `legal_moves`,
/// so a king that really does walk to g1 is left alone.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_rank_1_or_8 = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_rank_1_or_8 && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let rook_file = match mv.to.file() {
            File::G => File::H,
            _ => File::A,
        };

        let converted = Move {
            from: mv.from,
            to: Square::new(rook_file, mv.from.rank()),
            promotion: None,
        };

        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}

/// Format a move in UCI coordinate notation.
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format_square(mv.from);
    s.push_str(&format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(char::from(promo));
    }
    s
}

pub(crate) fn format_square(sq: Square) -> String {
    let mut s = String::with_capacity(2);
    s.push(file_char(sq.file()));
    s.push(rank_char(sq.rank()));
    s
}

pub(crate) fn file_char(file: File) -> char {
    char::from(file)
}

pub(crate) fn rank_char(rank: Rank) -> char {
    char::from(rank)
}

/// Upper-case SAN letter for a piece.
pub(crate) fn piece_letter(piece: Piece) -> char {
    char::from(piece).to_ascii_uppercase()
}
