use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::board::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Waiting,
    Active,
    WhiteWin,
    BlackWin,
    Draw,
    Timeout,
    Abandoned,
}

impl GameStatus {
    /// Waiting and Active are the only states a game can leave.
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Waiting | GameStatus::Active)
    }

    pub fn win_for(side: Side) -> GameStatus {
        match side {
            Side::White => GameStatus::WhiteWin,
            Side::Black => GameStatus::BlackWin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "Waiting",
            GameStatus::Active => "Active",
            GameStatus::WhiteWin => "WhiteWin",
            GameStatus::BlackWin => "BlackWin",
            GameStatus::Draw => "Draw",
            GameStatus::Timeout => "Timeout",
            GameStatus::Abandoned => "Abandoned",
        }
    }

    pub const TERMINAL: [GameStatus; 5] = [
        GameStatus::WhiteWin,
        GameStatus::BlackWin,
        GameStatus::Draw,
        GameStatus::Timeout,
        GameStatus::Abandoned,
    ];
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub white_player_id: String,
    pub black_player_id: Option<String>,
    pub status: GameStatus,
    pub current_turn: Side,
    pub current_position: String,
    pub draw_offered_by: Option<String>,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Game {
    pub fn new(white_player_id: &str, starting_position: &str) -> Self {
        let now = Utc::now();
        Game {
            game_id: Uuid::new_v4().to_string(),
            white_player_id: white_player_id.to_string(),
            black_player_id: None,
            status: GameStatus::Waiting,
            current_turn: Side::White,
            current_position: starting_position.to_string(),
            draw_offered_by: None,
            archived: false,
            archived_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Colour the player is assigned in this game, if any.
    pub fn player_side(&self, player_id: &str) -> Option<Side> {
        if self.white_player_id == player_id {
            Some(Side::White)
        } else if self.black_player_id.as_deref() == Some(player_id) {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn is_participant(&self, player_id: &str) -> bool {
        self.player_side(player_id).is_some()
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.archived = true;
        self.archived_at = Some(now);
    }
}
