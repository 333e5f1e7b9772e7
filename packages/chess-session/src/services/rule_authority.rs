//! The rules engine seam. Session logic only talks to these traits; the
//! concrete engine lives in [`crate::services::chess_service`].

use crate::models::board::{Move, PieceKind, Side, Square};
use crate::services::errors::rule_authority_errors::RuleAuthorityError;

/// A loaded position. Instances are built per request and never shared.
pub trait Position: Send {
    fn side_to_move(&self) -> Side;
    fn legal_moves(&self) -> Vec<Move>;
    fn piece_on(&self, square: Square) -> Option<(Side, PieceKind)>;
    fn is_legal(&self, chess_move: &Move) -> bool;
    fn apply(&self, chess_move: &Move) -> Result<Box<dyn Position>, RuleAuthorityError>;
    fn is_in_check(&self) -> bool;
    fn is_checkmated(&self) -> bool;
    fn is_stalemated(&self) -> bool;
    fn encode(&self) -> String;
}

pub trait RuleAuthority: Send + Sync {
    fn starting_position(&self) -> String;
    fn load_position(&self, encoding: &str) -> Result<Box<dyn Position>, RuleAuthorityError>;
}
