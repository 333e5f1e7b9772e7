use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One applied move. Owned by its game and never modified after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub game_id: String,
    pub move_number: u32,
    pub notation: String,
    pub uci: String,
    pub position_after: String,
    pub created_at: DateTime<Utc>,
}

impl MoveRecord {
    pub fn new(
        game_id: &str,
        move_number: u32,
        notation: &str,
        uci: &str,
        position_after: &str,
    ) -> Self {
        MoveRecord {
            game_id: game_id.to_string(),
            move_number,
            notation: notation.to_string(),
            uci: uci.to_string(),
            position_after: position_after.to_string(),
            created_at: Utc::now(),
        }
    }
}
