use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: i32 = 1200;
pub const RATING_FLOOR: i32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub display_name: String,
    pub rating: i32,
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by every commit that rates this player.
    #[serde(default)]
    pub version: u64,
}

impl Player {
    pub fn new(id: &str, display_name: &str) -> Self {
        let now = Utc::now();
        Player {
            id: id.to_string(),
            display_name: display_name.to_string(),
            rating: DEFAULT_RATING, // Default starting rating for chess platform
            games_played: 0,
            games_won: 0,
            games_lost: 0,
            games_drawn: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Percentage of played games won, 0 when nothing has been played yet.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        f64::from(self.games_won) / f64::from(self.games_played) * 100.0
    }
}
