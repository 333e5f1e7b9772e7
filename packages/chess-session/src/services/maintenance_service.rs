use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::CleanupPolicy;
use crate::models::game::{Game, GameStatus};
use crate::repositories::errors::repository_errors::RepositoryError;
use crate::repositories::game_repository::{GameCommit, GameRepository};
use crate::repositories::move_repository::MoveRepository;
use crate::services::game_locks::GameLocks;

/// Counts of what one sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub waiting_deleted: usize,
    pub archived: usize,
    pub purged: usize,
    /// Items or queries that failed and were skipped.
    pub failures: usize,
}

impl CleanupReport {
    pub fn changed(&self) -> usize {
        self.waiting_deleted + self.archived + self.purged
    }
}

enum Outcome {
    Applied,
    Skipped,
}

#[derive(Clone)]
pub struct MaintenanceService {
    games: Arc<dyn GameRepository>,
    moves: Arc<dyn MoveRepository>,
    locks: GameLocks,
}

impl MaintenanceService {
    pub fn new(
        games: Arc<dyn GameRepository>,
        moves: Arc<dyn MoveRepository>,
        locks: GameLocks,
    ) -> Self {
        MaintenanceService {
            games,
            moves,
            locks,
        }
    }

    /// Runs the three reaping passes in order. Never fails as a whole: each
    /// failed query or item is logged, counted and skipped.
    pub async fn cleanup_old_games(
        &self,
        now: DateTime<Utc>,
        policy: &CleanupPolicy,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        let waiting_cutoff = now - policy.waiting_ttl;
        match self.games.find_waiting_games_created_before(waiting_cutoff).await {
            Ok(games) => {
                for game in games {
                    let stale_waiting = |g: &Game| {
                        g.status == GameStatus::Waiting && g.created_at < waiting_cutoff
                    };
                    match self.delete_if(&game.game_id, stale_waiting).await {
                        Ok(Outcome::Applied) => report.waiting_deleted += 1,
                        Ok(Outcome::Skipped) => {}
                        Err(e) => {
                            error!("Failed to delete waiting game {}: {}", game.game_id, e);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to query waiting games: {}", e);
                report.failures += 1;
            }
        }

        let archive_cutoff = now - policy.archive_after;
        match self.games.find_finished_games_updated_before(archive_cutoff).await {
            Ok(games) => {
                for game in games.into_iter().filter(|g| !g.archived) {
                    match self.archive(&game.game_id, archive_cutoff, now).await {
                        Ok(Outcome::Applied) => report.archived += 1,
                        Ok(Outcome::Skipped) => {}
                        Err(e) => {
                            error!("Failed to archive game {}: {}", game.game_id, e);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to query games to archive: {}", e);
                report.failures += 1;
            }
        }

        let purge_cutoff = now - policy.purge_after;
        match self.games.find_finished_games_updated_before(purge_cutoff).await {
            Ok(games) => {
                for game in games {
                    let expired =
                        |g: &Game| g.status.is_terminal() && g.updated_at < purge_cutoff;
                    match self.delete_if(&game.game_id, expired).await {
                        Ok(Outcome::Applied) => report.purged += 1,
                        Ok(Outcome::Skipped) => {}
                        Err(e) => {
                            error!("Failed to purge game {}: {}", game.game_id, e);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to query games to purge: {}", e);
                report.failures += 1;
            }
        }

        info!(
            "Cleanup finished: {} waiting deleted, {} archived, {} purged, {} failures",
            report.waiting_deleted, report.archived, report.purged, report.failures
        );
        report
    }

    /// Deletes a game and its moves if it still matches `predicate` once locked.
    async fn delete_if(
        &self,
        game_id: &str,
        predicate: impl Fn(&Game) -> bool,
    ) -> Result<Outcome, RepositoryError> {
        let _guard = self.locks.acquire(game_id).await;
        let game = match self.games.get_game(game_id).await? {
            Some(game) if predicate(&game) => game,
            _ => {
                warn!("Game {} changed since it was selected, skipping", game_id);
                return Ok(Outcome::Skipped);
            }
        };

        let removed = self.moves.delete_by_game(game_id).await?;
        self.games.delete_game(&game).await?;
        info!("Deleted game {} ({}) with {} moves", game_id, game.status, removed);
        Ok(Outcome::Applied)
    }

    async fn archive(
        &self,
        game_id: &str,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Outcome, RepositoryError> {
        let _guard = self.locks.acquire(game_id).await;
        let mut game = match self.games.get_game(game_id).await? {
            Some(game) if game.status.is_terminal() && !game.archived && game.updated_at < cutoff => {
                game
            }
            _ => return Ok(Outcome::Skipped),
        };

        game.archive(now);
        self.games.commit(&GameCommit::new(game)).await?;
        info!("Archived game {}", game_id);
        Ok(Outcome::Applied)
    }
}
