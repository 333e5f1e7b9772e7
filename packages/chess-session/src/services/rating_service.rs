use chrono::Utc;
use tracing::{info, warn};

use crate::models::game::{Game, GameStatus};
use crate::models::player::{Player, RATING_FLOOR};

pub const WIN_DELTA: i32 = 20;
pub const LOSS_DELTA: i32 = 20;
pub const DRAW_DELTA: i32 = 5;

#[derive(Clone, Default)]
pub struct RatingUpdater;

impl RatingUpdater {
    pub fn new() -> Self {
        RatingUpdater
    }

    /// Applies the result of a finished game to both players and returns them
    /// for persisting. Returns an empty list when there is nothing to rate.
    pub fn apply(&self, game: &Game, white: Option<Player>, black: Option<Player>) -> Vec<Player> {
        let (mut white, mut black) = match (white, black) {
            (Some(white), Some(black)) => (white, black),
            _ => {
                warn!(
                    "Skipping rating update for game {}: a player is missing",
                    game.game_id
                );
                return Vec::new();
            }
        };

        if white.id != game.white_player_id || game.black_player_id.as_deref() != Some(&black.id)
        {
            warn!(
                "Skipping rating update for game {}: players do not match the game",
                game.game_id
            );
            return Vec::new();
        }

        match game.status {
            GameStatus::WhiteWin => {
                record_win(&mut white);
                record_loss(&mut black);
            }
            GameStatus::BlackWin => {
                record_win(&mut black);
                record_loss(&mut white);
            }
            GameStatus::Draw => {
                record_draw(&mut white);
                record_draw(&mut black);
            }
            _ => return Vec::new(),
        }

        info!(
            "Ratings updated for game {} ({}): {} -> {}, {} -> {}",
            game.game_id, game.status, white.id, white.rating, black.id, black.rating
        );
        vec![white, black]
    }
}

fn record_win(player: &mut Player) {
    player.games_played += 1;
    player.games_won += 1;
    player.rating += WIN_DELTA;
    player.updated_at = Utc::now();
}

fn record_loss(player: &mut Player) {
    player.games_played += 1;
    player.games_lost += 1;
    player.rating = (player.rating - LOSS_DELTA).max(RATING_FLOOR);
    player.updated_at = Utc::now();
}

fn record_draw(player: &mut Player) {
    player.games_played += 1;
    player.games_drawn += 1;
    player.rating += DRAW_DELTA;
    player.updated_at = Utc::now();
}
