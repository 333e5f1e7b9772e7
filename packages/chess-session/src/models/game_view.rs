use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::board::Side;
use crate::models::game::GameStatus;
use crate::models::player::Player;

/// Transient status annotation derived from the current position. Check is
/// never stored as a game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionAnnotation {
    None,
    Check,
    Checkmate,
    Stalemate,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: String,
    pub display_name: String,
    pub rating: i32,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        PlayerSummary {
            id: player.id.clone(),
            display_name: player.display_name.clone(),
            rating: player.rating,
        }
    }
}

/// Snapshot of a session returned by every session operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameView {
    pub game_id: String,
    pub status: GameStatus,
    pub annotation: PositionAnnotation,
    pub side_to_move: Side,
    /// `None` when the viewer is an observer.
    pub viewer_side: Option<Side>,
    pub white_player: Option<PlayerSummary>,
    pub black_player: Option<PlayerSummary>,
    pub move_count: u32,
    pub position: String,
    /// Filled only when the viewer is the side to move in an active game.
    pub legal_moves: Vec<String>,
    pub draw_offered_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry in the lobby of games waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingGame {
    pub game_id: String,
    pub white_player_name: String,
    pub created_at: DateTime<Utc>,
}
