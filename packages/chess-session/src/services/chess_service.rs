use chess::{
    Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square as BoardSquare,
};
use std::str::FromStr;

use crate::models::board::{Move, PieceKind, Side, Square};
use crate::services::errors::rule_authority_errors::RuleAuthorityError;
use crate::services::rule_authority::{Position, RuleAuthority};

pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Rule authority backed by the `chess` crate.
#[derive(Clone, Default)]
pub struct ChessRuleAuthority;

impl ChessRuleAuthority {
    pub fn new() -> Self {
        ChessRuleAuthority
    }
}

impl RuleAuthority for ChessRuleAuthority {
    fn starting_position(&self) -> String {
        STARTING_POSITION.to_string()
    }

    fn load_position(&self, encoding: &str) -> Result<Box<dyn Position>, RuleAuthorityError> {
        Ok(Box::new(ChessPosition::from_fen(encoding)?))
    }
}

/// `chess::Board` drops the move clocks when formatted, so they are carried
/// alongside it and written back into the encoding.
#[derive(Clone, Debug)]
pub struct ChessPosition {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl ChessPosition {
    pub fn from_fen(fen: &str) -> Result<Self, RuleAuthorityError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(RuleAuthorityError::InvalidPosition(format!(
                "Invalid FEN: {}",
                fen
            )));
        }

        let board = Board::from_str(&fields[..4].join(" ")).map_err(|e| {
            RuleAuthorityError::InvalidPosition(format!("Invalid FEN: {}", e))
        })?;
        let halfmove_clock = parse_clock(fields.get(4), 0, fen)?;
        let fullmove_number = parse_clock(fields.get(5), 1, fen)?;

        Ok(ChessPosition {
            board,
            halfmove_clock,
            fullmove_number,
        })
    }
}

fn parse_clock(field: Option<&&str>, default: u32, fen: &str) -> Result<u32, RuleAuthorityError> {
    match field {
        Some(value) => value.parse().map_err(|_| {
            RuleAuthorityError::InvalidPosition(format!("Invalid move clock in FEN: {}", fen))
        }),
        None => Ok(default),
    }
}

impl Position for ChessPosition {
    fn side_to_move(&self) -> Side {
        side_from_color(self.board.side_to_move())
    }

    fn legal_moves(&self) -> Vec<Move> {
        MoveGen::new_legal(&self.board).map(move_from_chess).collect()
    }

    fn piece_on(&self, square: Square) -> Option<(Side, PieceKind)> {
        let board_square = to_board_square(square);
        let piece = self.board.piece_on(board_square)?;
        let color = self.board.color_on(board_square)?;
        Some((side_from_color(color), piece_kind_from_piece(piece)))
    }

    fn is_legal(&self, chess_move: &Move) -> bool {
        self.board.legal(to_chess_move(chess_move))
    }

    fn apply(&self, chess_move: &Move) -> Result<Box<dyn Position>, RuleAuthorityError> {
        let converted = to_chess_move(chess_move);
        if !self.board.legal(converted) {
            return Err(RuleAuthorityError::IllegalMove(format!(
                "Move is not legal: {}",
                chess_move
            )));
        }

        let is_pawn_move = self.board.piece_on(converted.get_source()) == Some(Piece::Pawn);
        let is_capture = self.board.piece_on(converted.get_dest()).is_some();
        let halfmove_clock = if is_pawn_move || is_capture {
            0
        } else {
            self.halfmove_clock + 1
        };
        let fullmove_number = match self.board.side_to_move() {
            Color::White => self.fullmove_number,
            Color::Black => self.fullmove_number + 1,
        };

        Ok(Box::new(ChessPosition {
            board: self.board.make_move_new(converted),
            halfmove_clock,
            fullmove_number,
        }))
    }

    fn is_in_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    fn is_checkmated(&self) -> bool {
        self.board.status() == BoardStatus::Checkmate
    }

    fn is_stalemated(&self) -> bool {
        self.board.status() == BoardStatus::Stalemate
    }

    fn encode(&self) -> String {
        let formatted = self.board.to_string();
        let fields: Vec<&str> = formatted.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            fields.join(" "),
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

fn side_from_color(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

fn piece_kind_from_piece(piece: Piece) -> PieceKind {
    match piece {
        Piece::Pawn => PieceKind::Pawn,
        Piece::Knight => PieceKind::Knight,
        Piece::Bishop => PieceKind::Bishop,
        Piece::Rook => PieceKind::Rook,
        Piece::Queen => PieceKind::Queen,
        Piece::King => PieceKind::King,
    }
}

fn piece_from_kind(kind: PieceKind) -> Piece {
    match kind {
        PieceKind::Pawn => Piece::Pawn,
        PieceKind::Knight => Piece::Knight,
        PieceKind::Bishop => Piece::Bishop,
        PieceKind::Rook => Piece::Rook,
        PieceKind::Queen => Piece::Queen,
        PieceKind::King => Piece::King,
    }
}

fn to_board_square(square: Square) -> BoardSquare {
    BoardSquare::make_square(
        Rank::from_index(square.rank() as usize),
        File::from_index(square.file() as usize),
    )
}

fn from_board_square(square: BoardSquare) -> Square {
    Square::from_index(square.to_index() as u8)
}

fn to_chess_move(chess_move: &Move) -> ChessMove {
    ChessMove::new(
        to_board_square(chess_move.origin),
        to_board_square(chess_move.destination),
        chess_move.promotion.map(piece_from_kind),
    )
}

fn move_from_chess(chess_move: ChessMove) -> Move {
    Move::new(
        from_board_square(chess_move.get_source()),
        from_board_square(chess_move.get_dest()),
        chess_move.get_promotion().map(piece_kind_from_piece),
    )
}
