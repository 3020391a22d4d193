//! Token scanning over single lines of engine output.
//!
//! Every field extractor is a pure function of one line, so the worker can
//! pull out just what it needs and the extractors can be tested without an
//! engine.

use crate::uci::options::{parse_option_declaration, EngineOptionDeclaration};
use crate::uci::UciError;

/// Magnitude used in place of a centipawn value for mate scores.
pub const MATE_SCORE: f64 = 10000.0;

/// Incoming message from a UCI engine
#[derive(Debug, Clone, PartialEq)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// Moves are kept as text; engines send `bestmove (none)` when there is
    /// no legal move.
    BestMove { mv: String, ponder: Option<String> },
    Info(InfoLine),
    InfoString(String),
    Option(EngineOptionDeclaration),
}

/// The fields of an `info` line the analysis cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoLine {
    pub depth: Option<u32>,
    /// `None` when the engine omitted it; single-line engines never send it.
    pub multipv: Option<u32>,
    pub score: Option<ParsedScore>,
    pub nps: Option<u64>,
    pub hashfull: Option<u32>,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedScore {
    pub centipawns: f64,
    pub is_mate: bool,
    pub mate_distance: i32,
}

impl ParsedScore {
    pub fn centipawns(cp: i32) -> Self {
        Self {
            centipawns: f64::from(cp),
            is_mate: false,
            mate_distance: 0,
        }
    }

    /// `mate 0` means the side to move is already mated, so it counts as a
    /// loss like any negative distance.
    pub fn mate(distance: i32) -> Self {
        Self {
            centipawns: if distance > 0 { MATE_SCORE } else { -MATE_SCORE },
            is_mate: true,
            mate_distance: distance,
        }
    }

    /// The same score seen from the other side.
    pub fn negated(self) -> Self {
        Self {
            centipawns: -self.centipawns,
            is_mate: self.is_mate,
            mate_distance: -self.mate_distance,
        }
    }
}

/// Classify a line of engine output.
pub fn parse_uci_message(line: &str) -> Result<UciMessage, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        None => Err(UciError::Empty),
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(UciError::MalformedMessage(line.to_string()));
            }
            Ok(UciMessage::Id {
                name: tokens[1].to_string(),
                value: tokens[2..].join(" "),
            })
        }

        Some(&"bestmove") => {
            let Some(mv) = tokens.get(1) else {
                return Err(UciError::MalformedMessage(line.to_string()));
            };
            let ponder = match tokens.get(2) {
                Some(&"ponder") => tokens.get(3).map(|p| p.to_string()),
                _ => None,
            };
            Ok(UciMessage::BestMove {
                mv: mv.to_string(),
                ponder,
            })
        }

        Some(&"info") => {
            if tokens.get(1) == Some(&"string") {
                return Ok(UciMessage::InfoString(tokens[2..].join(" ")));
            }
            Ok(UciMessage::Info(InfoLine {
                depth: parse_depth(line),
                multipv: parse_multipv(line),
                score: parse_score(line),
                nps: parse_nps(line),
                hashfull: parse_hashfull(line),
                pv: parse_pv_moves(line)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            }))
        }

        Some(&"option") => parse_option_declaration(line)
            .map(UciMessage::Option)
            .ok_or_else(|| UciError::MalformedMessage(line.to_string())),

        _ => Err(UciError::UnknownMessage(line.to_string())),
    }
}

/// The token following the first occurrence of `keyword`, parsed.
fn value_after<T: std::str::FromStr>(line: &str, keyword: &str) -> Option<T> {
    let mut tokens = line.split_whitespace();
    tokens.by_ref().find(|t| *t == keyword)?;
    tokens.next()?.parse().ok()
}

pub fn parse_depth(line: &str) -> Option<u32> {
    value_after(line, "depth")
}

pub fn parse_nps(line: &str) -> Option<u64> {
    value_after(line, "nps")
}

pub fn parse_hashfull(line: &str) -> Option<u32> {
    value_after(line, "hashfull")
}

/// The `multipv` field as sent. Callers treat `None` as slot 1.
pub fn parse_multipv(line: &str) -> Option<u32> {
    value_after(line, "multipv")
}

pub fn parse_score(line: &str) -> Option<ParsedScore> {
    let mut tokens = line.split_whitespace();
    tokens.by_ref().find(|t| *t == "score")?;
    match tokens.next()? {
        "cp" => tokens.next()?.parse().ok().map(ParsedScore::centipawns),
        "mate" => tokens.next()?.parse().ok().map(ParsedScore::mate),
        _ => None,
    }
}

/// Raw coordinate-notation moves after `pv`.
pub fn parse_pv_moves(line: &str) -> Vec<&str> {
    let mut tokens = line.split_whitespace();
    if tokens.by_ref().find(|t| *t == "pv").is_none() {
        return Vec::new();
    }
    tokens.collect()
}

/// The principal variation in SAN, replayed on `fen` and capped at
/// `max_moves`. Replay stops at the first illegal move; `None` when not even
/// the first move is legal or the line has no `pv`. If the FEN itself cannot
/// be parsed the raw coordinate moves are returned instead.
pub fn parse_pv(line: &str, fen: &str, max_moves: usize) -> Option<String> {
    let moves = parse_pv_moves(line);
    if moves.is_empty() {
        return None;
    }

    match chess::uci_line_to_san(fen, &moves, max_moves) {
        Ok(san) if san.is_empty() => None,
        Ok(san) => Some(san.join(" ")),
        Err(e) => {
            tracing::debug!(error = %e, "PV replay failed, keeping coordinate moves");
            Some(
                moves
                    .into_iter()
                    .take(max_moves)
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_parse_uciok() {
        assert_eq!(parse_uci_message("uciok").unwrap(), UciMessage::UciOk);
        assert_eq!(parse_uci_message("readyok").unwrap(), UciMessage::ReadyOk);
    }

    #[test]
    fn test_parse_id() {
        let msg = parse_uci_message("id name Stockfish 16.1").unwrap();
        assert_eq!(
            msg,
            UciMessage::Id {
                name: "name".to_string(),
                value: "Stockfish 16.1".to_string()
            }
        );
        assert!(parse_uci_message("id name").is_err());
    }

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        assert_eq!(
            msg,
            UciMessage::BestMove {
                mv: "e2e4".to_string(),
                ponder: Some("e7e5".to_string())
            }
        );
        let msg = parse_uci_message("bestmove (none)").unwrap();
        assert!(matches!(msg, UciMessage::BestMove { ref mv, ponder: None } if mv == "(none)"));
        assert!(parse_uci_message("bestmove").is_err());
    }

    #[test]
    fn test_parse_info() {
        let line = "info depth 20 seldepth 28 multipv 2 score cp 35 nodes 1000 nps 1500000 hashfull 412 time 500 pv e2e4 e7e5 g1f3";
        let UciMessage::Info(info) = parse_uci_message(line).unwrap() else {
            panic!("Expected Info message");
        };
        assert_eq!(info.depth, Some(20));
        assert_eq!(info.multipv, Some(2));
        assert_eq!(info.score, Some(ParsedScore::centipawns(35)));
        assert_eq!(info.nps, Some(1_500_000));
        assert_eq!(info.hashfull, Some(412));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_parse_info_string() {
        let msg = parse_uci_message("info string NNUE evaluation using nn.nnue").unwrap();
        assert_eq!(
            msg,
            UciMessage::InfoString("NNUE evaluation using nn.nnue".to_string())
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!(matches!(parse_uci_message(""), Err(UciError::Empty)));
        assert!(matches!(
            parse_uci_message("copyprotection ok"),
            Err(UciError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_depth_does_not_match_seldepth() {
        assert_eq!(parse_depth("info seldepth 30 depth 12"), Some(12));
        assert_eq!(parse_depth("info nodes 100"), None);
        assert_eq!(parse_depth("info depth x"), None);
        assert_eq!(parse_depth("info depth"), None);
    }

    #[test]
    fn test_multipv_absent() {
        assert_eq!(parse_multipv("info depth 5 score cp 3 pv e2e4"), None);
        assert_eq!(parse_multipv("info depth 5 multipv 3"), Some(3));
    }

    #[test]
    fn test_parse_score_mate() {
        let score = parse_score("info depth 30 score mate 3 pv d8h4").unwrap();
        assert!(score.is_mate);
        assert_eq!(score.mate_distance, 3);
        assert_eq!(score.centipawns, MATE_SCORE);

        let score = parse_score("info score mate -2").unwrap();
        assert_eq!(score.centipawns, -MATE_SCORE);
        assert_eq!(score.mate_distance, -2);

        let score = parse_score("info score mate 0").unwrap();
        assert_eq!(score.centipawns, -MATE_SCORE);
    }

    #[test]
    fn test_parse_score_bounds_and_garbage() {
        let score = parse_score("info depth 8 score cp -41 lowerbound nodes 5").unwrap();
        assert_eq!(score, ParsedScore::centipawns(-41));
        assert_eq!(parse_score("info depth 8 score wdl 1 2 3"), None);
        assert_eq!(parse_score("info depth 8 score cp"), None);
        assert_eq!(parse_score("info depth 8"), None);
    }

    #[test]
    fn test_negated_score() {
        let score = ParsedScore::mate(4).negated();
        assert_eq!(score.centipawns, -MATE_SCORE);
        assert_eq!(score.mate_distance, -4);
        assert!(score.is_mate);
        assert_eq!(ParsedScore::centipawns(25).negated().centipawns, -25.0);
    }

    #[test]
    fn test_parse_pv_to_san() {
        let pv = parse_pv("info depth 10 score cp 20 pv e2e4 e7e5 g1f3", START_FEN, 5);
        assert_eq!(pv.as_deref(), Some("e4 e5 Nf3"));
    }

    #[test]
    fn test_parse_pv_cap_and_truncation() {
        let line = "info depth 10 pv e2e4 e7e5 g1f3 b8c6";
        assert_eq!(parse_pv(line, START_FEN, 2).as_deref(), Some("e4 e5"));

        let line = "info depth 10 pv e2e4 e2e4 g1f3";
        assert_eq!(parse_pv(line, START_FEN, 5).as_deref(), Some("e4"));
    }

    #[test]
    fn test_parse_pv_first_move_illegal() {
        // A move from the previous position, before the board changed.
        assert_eq!(parse_pv("info depth 10 pv e7e5", START_FEN, 5), None);
        assert_eq!(parse_pv("info depth 10 score cp 3", START_FEN, 5), None);
    }

    #[test]
    fn test_parse_pv_bad_fen_falls_back() {
        let pv = parse_pv("info pv e2e4 e7e5 g1f3", "garbage", 2);
        assert_eq!(pv.as_deref(), Some("e2e4 e7e5"));
    }
}
