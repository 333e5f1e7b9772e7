use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::models::game::{Game, GameStatus};
use crate::models::move_record::MoveRecord;
use crate::models::player::Player;
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::game_repository::{GameCommit, GameRepository};
use crate::repositories::move_repository::MoveRepository;
use crate::repositories::player_repository::PlayerRepository;

#[derive(Default)]
struct Tables {
    games: HashMap<String, Game>,
    players: HashMap<String, Player>,
    moves: HashMap<String, Vec<MoveRecord>>,
}

/// Process-local store implementing every repository over one lock, so a
/// commit is observed entirely or not at all.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_move_slot(moves: &[MoveRecord], record: &MoveRecord) -> Result<(), RepositoryError> {
    let expected = moves.len() as u32 + 1;
    if record.move_number != expected {
        return Err(RepositoryError::Conflict(format!(
            "move {} of game {} does not follow move {}",
            record.move_number,
            record.game_id,
            expected - 1
        )));
    }
    Ok(())
}

#[async_trait]
impl GameRepository for InMemoryRepository {
    async fn create_game(&self, game: &Game) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.games.contains_key(&game.game_id) {
            return Err(RepositoryError::Conflict(format!(
                "game {} already exists",
                game.game_id
            )));
        }
        tables.games.insert(game.game_id.clone(), game.clone());
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, RepositoryError> {
        Ok(self.tables.lock().await.games.get(game_id).cloned())
    }

    async fn find_active_games_by_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<Game>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .games
            .values()
            .filter(|g| matches!(g.status, GameStatus::Waiting | GameStatus::Active))
            .filter(|g| g.is_participant(player_id))
            .cloned()
            .collect())
    }

    async fn find_waiting_games_created_after(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .games
            .values()
            .filter(|g| g.status == GameStatus::Waiting && g.created_at > since)
            .cloned()
            .collect())
    }

    async fn find_waiting_games_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .games
            .values()
            .filter(|g| g.status == GameStatus::Waiting && g.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn find_finished_games_updated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .games
            .values()
            .filter(|g| g.status.is_terminal() && g.updated_at < cutoff)
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: &GameCommit) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let game_id = &commit.game.game_id;

        let stored_version = tables
            .games
            .get(game_id)
            .map(|g| g.version)
            .ok_or(RepositoryError::NotFound)?;
        if stored_version != commit.expected_version {
            return Err(RepositoryError::Conflict(format!(
                "game {} is at version {}, expected {}",
                game_id, stored_version, commit.expected_version
            )));
        }
        if let Some(record) = &commit.new_move {
            let moves = tables.moves.get(game_id).map(Vec::as_slice).unwrap_or(&[]);
            check_move_slot(moves, record)?;
        }
        for write in &commit.players {
            let stored = tables
                .players
                .get(&write.player.id)
                .ok_or(RepositoryError::NotFound)?;
            if stored.version != write.expected_version {
                return Err(RepositoryError::Conflict(format!(
                    "player {} is at version {}, expected {}",
                    stored.id, stored.version, write.expected_version
                )));
            }
        }

        tables.games.insert(game_id.clone(), commit.game.clone());
        if let Some(record) = &commit.new_move {
            tables
                .moves
                .entry(game_id.clone())
                .or_default()
                .push(record.clone());
        }
        for write in &commit.players {
            tables
                .players
                .insert(write.player.id.clone(), write.player.clone());
        }
        Ok(())
    }

    async fn delete_game(&self, game: &Game) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        match tables.games.get(&game.game_id) {
            None => Err(RepositoryError::NotFound),
            Some(stored) if stored.version != game.version => Err(RepositoryError::Conflict(
                format!("game {} changed before deletion", game.game_id),
            )),
            Some(_) => {
                tables.games.remove(&game.game_id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PlayerRepository for InMemoryRepository {
    async fn get_or_create_player(
        &self,
        player_id: &str,
        display_name: &str,
    ) -> Result<Player, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let player = tables
            .players
            .entry(player_id.to_string())
            .or_insert_with(|| Player::new(player_id, display_name));
        Ok(player.clone())
    }

    async fn get_player(&self, player_id: &str) -> Result<Option<Player>, RepositoryError> {
        Ok(self.tables.lock().await.players.get(player_id).cloned())
    }
}

#[async_trait]
impl MoveRepository for InMemoryRepository {
    async fn count_by_game(&self, game_id: &str) -> Result<u32, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.moves.get(game_id).map_or(0, |moves| moves.len() as u32))
    }

    async fn find_by_game(&self, game_id: &str) -> Result<Vec<MoveRecord>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.moves.get(game_id).cloned().unwrap_or_default())
    }

    async fn delete_by_game(&self, game_id: &str) -> Result<usize, RepositoryError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.moves.remove(game_id).map_or(0, |moves| moves.len()))
    }
}
