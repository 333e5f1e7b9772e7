//! Turns human-entered move text into exactly one legal move.
//!
//! Input goes through three steps: [`NotationResolver::normalize`] cleans up
//! spacing, castling spellings, annotation glyphs and `e2-e4` dashes;
//! [`NotationResolver::classify`] sorts the result into a [`Notation`]
//! variant; [`NotationResolver::resolve`] matches that variant against the
//! legal moves of the position.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::models::board::{Move, PieceKind, Side, Square};
use crate::services::errors::notation_errors::NotationError;
use crate::services::rule_authority::Position;

const KINGSIDE_TOKEN: &str = "O-O";
const QUEENSIDE_TOKEN: &str = "O-O-O";

lazy_static! {
    static ref CASTLING_PATTERN: Regex =
        Regex::new(r"^(?i)[0o]-[0o](-[0o])?$").expect("Valid castling regex");
    static ref SQUARE_DASH_PATTERN: Regex =
        Regex::new(r"^([a-hA-H][1-8])-([a-hA-H][1-8])").expect("Valid square dash regex");
    static ref COORDINATE_PATTERN: Regex =
        Regex::new(r"^(?i)([a-h][1-8])([a-h][1-8])(?:=?([a-z]))?$")
            .expect("Valid coordinate regex");
    // Lowercase piece letters are accepted except `b`, which is always a file.
    // Uppercase files are accepted except `B`, which is always the bishop.
    static ref ALGEBRAIC_PATTERN: Regex = Regex::new(
        r"^([KQRBNkqrn])?([a-hA-H])?([1-8])?(x)?([a-hA-H][1-8])(?:=?([A-Za-z]))?$"
    )
    .expect("Valid algebraic regex");
    static ref PIECE_LETTERS: HashMap<char, PieceKind> = HashMap::from([
        ('K', PieceKind::King),
        ('Q', PieceKind::Queen),
        ('R', PieceKind::Rook),
        ('B', PieceKind::Bishop),
        ('N', PieceKind::Knight),
    ]);
    static ref PROMOTION_LETTERS: HashMap<char, PieceKind> = HashMap::from([
        ('Q', PieceKind::Queen),
        ('R', PieceKind::Rook),
        ('B', PieceKind::Bishop),
        ('N', PieceKind::Knight),
    ]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastlingSide {
    Kingside,
    Queenside,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgebraicMove {
    pub piece: PieceKind,
    pub origin_file: Option<u8>,
    pub origin_rank: Option<u8>,
    pub capture: bool,
    pub target: Square,
    pub promotion: Option<char>,
}

/// The shape a notation string was recognised as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notation {
    Castling(CastlingSide),
    Coordinate {
        origin: Square,
        destination: Square,
        promotion: Option<char>,
    },
    Algebraic(AlgebraicMove),
    Unrecognized(String),
}

#[derive(Clone, Default)]
pub struct NotationResolver;

impl NotationResolver {
    pub fn new() -> Self {
        NotationResolver
    }

    pub fn normalize(notation: &str) -> String {
        let compact: String = notation.split_whitespace().collect();
        let stripped = compact.trim_end_matches(['+', '#', '!', '?']);

        if CASTLING_PATTERN.is_match(stripped) {
            return if stripped.len() > 3 {
                QUEENSIDE_TOKEN.to_string()
            } else {
                KINGSIDE_TOKEN.to_string()
            };
        }

        SQUARE_DASH_PATTERN
            .replace(stripped, "${1}${2}")
            .into_owned()
    }

    /// Sorts normalized text into one notation form. Coordinate form wins over
    /// algebraic so that `e2e4` is never read as a pawn disambiguated by `e2`.
    pub fn classify(normalized: &str) -> Notation {
        match normalized {
            KINGSIDE_TOKEN => return Notation::Castling(CastlingSide::Kingside),
            QUEENSIDE_TOKEN => return Notation::Castling(CastlingSide::Queenside),
            _ => {}
        }

        if let Some(captures) = COORDINATE_PATTERN.captures(normalized) {
            let origin = captures[1].parse::<Square>();
            let destination = captures[2].parse::<Square>();
            if let (Ok(origin), Ok(destination)) = (origin, destination) {
                return Notation::Coordinate {
                    origin,
                    destination,
                    promotion: captures.get(3).and_then(|m| m.as_str().chars().next()),
                };
            }
        }

        if let Some(captures) = ALGEBRAIC_PATTERN.captures(normalized) {
            let piece = match captures.get(1) {
                Some(letter) => letter
                    .as_str()
                    .chars()
                    .next()
                    .and_then(|c| PIECE_LETTERS.get(&c.to_ascii_uppercase()).copied()),
                None => Some(PieceKind::Pawn),
            };
            let target = captures[5].parse::<Square>();
            if let (Some(piece), Ok(target)) = (piece, target) {
                return Notation::Algebraic(AlgebraicMove {
                    piece,
                    origin_file: captures
                        .get(2)
                        .map(|m| m.as_str().as_bytes()[0].to_ascii_lowercase() - b'a'),
                    origin_rank: captures.get(3).map(|m| m.as_str().as_bytes()[0] - b'1'),
                    capture: captures.get(4).is_some(),
                    target,
                    promotion: captures.get(6).and_then(|m| m.as_str().chars().next()),
                });
            }
        }

        Notation::Unrecognized(normalized.to_string())
    }

    pub fn resolve(&self, notation: &str, position: &dyn Position) -> Result<Move, NotationError> {
        let normalized = Self::normalize(notation);
        let legal_moves = position.legal_moves();

        let resolved = match Self::classify(&normalized) {
            Notation::Castling(wing) => {
                resolve_castling(wing, position.side_to_move(), &legal_moves, &normalized)
            }
            Notation::Coordinate {
                origin,
                destination,
                promotion,
            } => resolve_coordinate(
                origin,
                destination,
                promotion,
                position,
                &legal_moves,
                &normalized,
            ),
            Notation::Algebraic(algebraic) => {
                resolve_algebraic(&algebraic, position, &legal_moves, &normalized)
            }
            Notation::Unrecognized(text) => resolve_unrecognized(&text, &legal_moves),
        };

        match &resolved {
            Ok(chess_move) => debug!("Resolved {:?} to {}", notation, chess_move),
            Err(e) => debug!("Could not resolve {:?}: {}", notation, e),
        }
        resolved
    }
}

fn promotion_piece(letter: char) -> Result<PieceKind, NotationError> {
    PROMOTION_LETTERS
        .get(&letter.to_ascii_uppercase())
        .copied()
        .ok_or(NotationError::InvalidPromotionPiece(letter))
}

fn require_legal(
    candidate: Move,
    legal_moves: &[Move],
    normalized: &str,
) -> Result<Move, NotationError> {
    if legal_moves.contains(&candidate) {
        Ok(candidate)
    } else {
        Err(NotationError::NoLegalCandidate(normalized.to_string()))
    }
}

fn resolve_castling(
    wing: CastlingSide,
    side: Side,
    legal_moves: &[Move],
    normalized: &str,
) -> Result<Move, NotationError> {
    let rank = side.back_rank();
    let destination_file = match wing {
        CastlingSide::Kingside => 6,
        CastlingSide::Queenside => 2,
    };
    let king_move = Square::new(4, rank)
        .zip(Square::new(destination_file, rank))
        .map(|(origin, destination)| Move::new(origin, destination, None))
        .ok_or_else(|| NotationError::UnparseableNotation(normalized.to_string()))?;

    require_legal(king_move, legal_moves, normalized)
}

fn resolve_coordinate(
    origin: Square,
    destination: Square,
    promotion: Option<char>,
    position: &dyn Position,
    legal_moves: &[Move],
    normalized: &str,
) -> Result<Move, NotationError> {
    let promotion = promotion.map(promotion_piece).transpose()?;

    if promotion.is_some() {
        let side = position.side_to_move();
        let pawn_on_origin = position.piece_on(origin) == Some((side, PieceKind::Pawn));
        if !pawn_on_origin || destination.rank() != side.promotion_rank() {
            return Err(NotationError::NoLegalCandidate(normalized.to_string()));
        }
    }

    require_legal(
        Move::new(origin, destination, promotion),
        legal_moves,
        normalized,
    )
}

fn resolve_algebraic(
    algebraic: &AlgebraicMove,
    position: &dyn Position,
    legal_moves: &[Move],
    normalized: &str,
) -> Result<Move, NotationError> {
    let promotion = algebraic.promotion.map(promotion_piece).transpose()?;

    let candidates: Vec<Move> = legal_moves
        .iter()
        .filter(|m| m.destination == algebraic.target)
        .filter(|m| {
            position
                .piece_on(m.origin)
                .is_some_and(|(_, kind)| kind == algebraic.piece)
        })
        .filter(|m| algebraic.origin_file.map_or(true, |f| m.origin.file() == f))
        .filter(|m| algebraic.origin_rank.map_or(true, |r| m.origin.rank() == r))
        .filter(|m| promotion.map_or(true, |p| m.promotion == Some(p)))
        .copied()
        .collect();

    // The capture marker never narrows: every candidate shares the target
    // square, so its occupancy cannot tell them apart.
    match candidates.as_slice() {
        [] => return Err(NotationError::NoLegalCandidate(normalized.to_string())),
        [only] => return Ok(*only),
        _ => {}
    }

    let mut names: Vec<String> = candidates.iter().map(|m| m.to_string()).collect();
    names.sort();
    Err(NotationError::AmbiguousCandidate {
        notation: normalized.to_string(),
        candidates: names,
    })
}

fn resolve_unrecognized(text: &str, legal_moves: &[Move]) -> Result<Move, NotationError> {
    let wanted = text.to_ascii_lowercase();
    let wanted_compact = wanted.replace('-', "");

    legal_moves
        .iter()
        .find(|m| {
            let plain = m.to_string();
            let separated = format!("{}-{}", m.origin, m.destination);
            plain == wanted || separated == wanted || plain == wanted_compact
        })
        .copied()
        .ok_or_else(|| NotationError::UnparseableNotation(text.to_string()))
}
