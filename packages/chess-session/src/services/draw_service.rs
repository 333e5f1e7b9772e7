use tracing::debug;

use crate::services::rule_authority::Position;

/// Half-moves without a pawn move or capture after which the game is drawn.
pub const FIFTY_MOVE_HALF_MOVES: u32 = 100;
pub const REPETITION_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    Stalemate,
    Repetition,
    FiftyMoveRule,
    InsufficientMaterial,
}

/// What the rule authority itself knows about the position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawSignals {
    pub stalemate: bool,
    pub repetition: bool,
}

impl DrawSignals {
    /// `history` holds every earlier position of the game, starting position included.
    pub fn from_position(position: &dyn Position, history: &[String]) -> Self {
        let current = position.encode();
        DrawSignals {
            stalemate: position.is_stalemated(),
            repetition: repetition_count(&current, history) >= REPETITION_LIMIT,
        }
    }
}

#[derive(Clone, Default)]
pub struct DrawDetector;

impl DrawDetector {
    pub fn new() -> Self {
        DrawDetector
    }

    pub fn is_draw(&self, encoding: &str, signals: &DrawSignals) -> bool {
        self.classify(encoding, signals).is_some()
    }

    /// First matching draw rule, checked in order: authority signals, fifty-move
    /// rule, insufficient material.
    pub fn classify(&self, encoding: &str, signals: &DrawSignals) -> Option<DrawReason> {
        let reason = if signals.stalemate {
            Some(DrawReason::Stalemate)
        } else if signals.repetition {
            Some(DrawReason::Repetition)
        } else if halfmove_clock(encoding).is_some_and(|clock| clock >= FIFTY_MOVE_HALF_MOVES) {
            Some(DrawReason::FiftyMoveRule)
        } else if has_insufficient_material(encoding) {
            Some(DrawReason::InsufficientMaterial)
        } else {
            None
        };

        if let Some(reason) = reason {
            debug!("Draw detected ({:?}) in position {}", reason, encoding);
        }
        reason
    }
}

/// Placement, side to move, castling rights and en passant square.
fn position_key(encoding: &str) -> String {
    encoding
        .split_whitespace()
        .take(4)
        .collect::<Vec<&str>>()
        .join(" ")
}

fn repetition_count(current: &str, history: &[String]) -> usize {
    let key = position_key(current);
    1 + history
        .iter()
        .filter(|earlier| position_key(earlier) == key)
        .count()
}

fn halfmove_clock(encoding: &str) -> Option<u32> {
    encoding.split_whitespace().nth(4)?.parse().ok()
}

#[derive(Default)]
struct Material {
    knights: u32,
    bishops: u32,
}

impl Material {
    fn pieces(&self) -> u32 {
        self.knights + self.bishops
    }
}

// Bishops on same-coloured squares are not compared: any lone bishop pair counts.
fn has_insufficient_material(encoding: &str) -> bool {
    let placement = encoding.split_whitespace().next().unwrap_or_default();
    let mut white = Material::default();
    let mut black = Material::default();

    for symbol in placement.chars().filter(|c| c.is_ascii_alphabetic()) {
        let side = if symbol.is_ascii_uppercase() {
            &mut white
        } else {
            &mut black
        };
        match symbol.to_ascii_lowercase() {
            'p' | 'r' | 'q' => return false,
            'n' => side.knights += 1,
            'b' => side.bishops += 1,
            _ => {}
        }
    }

    let lone_minor_against_bare_king = |strong: &Material, bare: &Material| {
        bare.pieces() == 0 && strong.pieces() <= 1
    };
    let bishop_each = white.bishops == 1
        && black.bishops == 1
        && white.knights == 0
        && black.knights == 0;

    lone_minor_against_bare_king(&white, &black)
        || lone_minor_against_bare_king(&black, &white)
        || bishop_each
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chess_service::{ChessRuleAuthority, STARTING_POSITION};
    use crate::services::rule_authority::RuleAuthority;
    use rstest::rstest;

    fn no_signals() -> DrawSignals {
        DrawSignals::default()
    }

    #[rstest]
    #[case("8/8/8/4k3/8/8/8/4K3 w - - 0 1")]
    #[case("8/8/8/4k3/8/8/3B4/4K3 w - - 0 1")]
    #[case("8/8/8/4k3/8/8/3N4/4K3 b - - 0 1")]
    #[case("8/8/2n5/4k3/8/8/8/4K3 w - - 0 1")]
    #[case("8/8/2b5/4k3/8/8/3B4/4K3 w - - 0 1")]
    #[case("8/8/3b4/4k3/8/8/3B4/4K3 w - - 0 1")]
    fn test_insufficient_material(#[case] fen: &str) {
        assert_eq!(
            DrawDetector::new().classify(fen, &no_signals()),
            Some(DrawReason::InsufficientMaterial)
        );
    }

    #[rstest]
    #[case(STARTING_POSITION)]
    #[case("8/8/8/4k3/8/8/3P4/4K3 w - - 0 1")]
    #[case("8/8/8/4k3/8/8/3R4/4K3 w - - 0 1")]
    #[case("8/8/8/4k3/8/8/3Q4/4K3 w - - 0 1")]
    #[case("8/8/8/4k3/8/8/2NN4/4K3 w - - 0 1")]
    #[case("8/8/2n5/4k3/8/8/3B4/4K3 w - - 0 1")]
    #[case("8/8/2b5/4k3/8/8/2BB4/4K3 w - - 0 1")]
    fn test_sufficient_material(#[case] fen: &str) {
        assert!(!DrawDetector::new().is_draw(fen, &no_signals()));
    }

    #[test]
    fn test_fifty_move_threshold() {
        let detector = DrawDetector::new();
        let at_limit = "r3k3/8/8/8/8/8/8/R3K3 w - - 100 80";
        let below_limit = "r3k3/8/8/8/8/8/8/R3K3 w - - 99 80";

        assert_eq!(
            detector.classify(at_limit, &no_signals()),
            Some(DrawReason::FiftyMoveRule)
        );
        assert!(!detector.is_draw(below_limit, &no_signals()));
    }

    #[test]
    fn test_authority_signals_take_precedence() {
        let detector = DrawDetector::new();
        let fen = "r3k3/8/8/8/8/8/8/R3K3 w - - 120 80";

        let stalemate = DrawSignals {
            stalemate: true,
            repetition: true,
        };
        assert_eq!(detector.classify(fen, &stalemate), Some(DrawReason::Stalemate));

        let repetition = DrawSignals {
            stalemate: false,
            repetition: true,
        };
        assert_eq!(detector.classify(fen, &repetition), Some(DrawReason::Repetition));
    }

    #[test]
    fn test_signals_from_stalemated_position() {
        let position = ChessRuleAuthority::new()
            .load_position("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1")
            .unwrap();

        let signals = DrawSignals::from_position(position.as_ref(), &[]);

        assert!(signals.stalemate);
        assert!(!signals.repetition);
    }

    #[test]
    fn test_repetition_ignores_move_clocks() {
        let history = vec![
            "4k3/8/8/8/8/8/8/R3K3 w - - 0 1".to_string(),
            "4k3/8/8/8/8/8/8/R3K3 w - - 4 3".to_string(),
            "4k3/8/8/8/8/8/8/3RK3 b - - 5 3".to_string(),
        ];

        assert_eq!(
            repetition_count("4k3/8/8/8/8/8/8/R3K3 w - - 8 5", &history),
            3
        );
        assert_eq!(
            repetition_count("4k3/8/8/8/8/8/8/3RK3 w - - 8 5", &history),
            1
        );
    }
}
