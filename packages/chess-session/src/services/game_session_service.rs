use std::sync::Arc;

use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::{
    config::TableConfig,
    models::{
        board::Side,
        game::{Game, GameStatus},
        game_view::{GameView, PlayerSummary, PositionAnnotation, WaitingGame},
        move_record::MoveRecord,
        player::Player,
    },
    repositories::{
        errors::repository_errors::RepositoryError,
        game_repository::{DynamoDbGameRepository, GameCommit, GameRepository},
        move_repository::{DynamoDbMoveRepository, MoveRepository},
        player_repository::{DynamoDbPlayerRepository, PlayerRepository},
    },
    services::{
        draw_service::{DrawDetector, DrawSignals},
        errors::game_session_service_errors::GameSessionServiceError,
        game_locks::GameLocks,
        notation_service::NotationResolver,
        rating_service::RatingUpdater,
        rule_authority::{Position, RuleAuthority},
    },
};

/// How far back the lobby looks for games waiting for an opponent.
pub const LOBBY_WINDOW_HOURS: i64 = 1;

/// Attempts at committing a finished game whose players were rated elsewhere
/// in the meantime.
const MAX_FINISH_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct GameSessionService {
    games: Arc<dyn GameRepository>,
    players: Arc<dyn PlayerRepository>,
    moves: Arc<dyn MoveRepository>,
    rule_authority: Arc<dyn RuleAuthority>,
    locks: GameLocks,
    creation_locks: GameLocks,
    resolver: NotationResolver,
    draw_detector: DrawDetector,
    rating_updater: RatingUpdater,
}

impl GameSessionService {
    pub fn new(
        games: Arc<dyn GameRepository>,
        players: Arc<dyn PlayerRepository>,
        moves: Arc<dyn MoveRepository>,
        rule_authority: Arc<dyn RuleAuthority>,
        locks: GameLocks,
    ) -> Self {
        GameSessionService {
            games,
            players,
            moves,
            rule_authority,
            locks,
            creation_locks: GameLocks::new(),
            resolver: NotationResolver::new(),
            draw_detector: DrawDetector::new(),
            rating_updater: RatingUpdater::new(),
        }
    }

    /// Wires the service to the DynamoDB tables named in `tables`.
    pub fn with_dynamodb(
        client: Client,
        tables: &TableConfig,
        rule_authority: Arc<dyn RuleAuthority>,
        locks: GameLocks,
    ) -> Self {
        Self::new(
            Arc::new(DynamoDbGameRepository::new(client.clone(), tables.clone())),
            Arc::new(DynamoDbPlayerRepository::new(client.clone(), tables)),
            Arc::new(DynamoDbMoveRepository::new(client, tables)),
            rule_authority,
            locks,
        )
    }

    pub async fn create_game(
        &self,
        creator_id: &str,
        display_name: &str,
    ) -> Result<GameView, GameSessionServiceError> {
        // One creation at a time per player, so the open-game check holds.
        let _guard = self.creation_locks.acquire(creator_id).await;
        let creator = self
            .players
            .get_or_create_player(creator_id, display_name)
            .await?;

        let active = self.games.find_active_games_by_player(&creator.id).await?;
        if let Some(existing) = active.first() {
            return Err(GameSessionServiceError::AlreadyInActiveGame(
                existing.game_id.clone(),
            ));
        }

        let game = Game::new(&creator.id, &self.rule_authority.starting_position());
        self.games.create_game(&game).await?;
        info!("Game {} created by {}", game.game_id, creator.id);

        self.build_view(&game, Some(&creator.id)).await
    }

    pub async fn join_game(
        &self,
        game_id: &str,
        joiner_id: &str,
        display_name: &str,
    ) -> Result<GameView, GameSessionServiceError> {
        let _guard = self.locks.acquire(game_id).await;
        let mut game = self.load_game(game_id).await?;
        require_status(&game, GameStatus::Waiting)?;

        let joiner = self
            .players
            .get_or_create_player(joiner_id, display_name)
            .await?;
        if joiner.id == game.white_player_id {
            return Err(GameSessionServiceError::SelfJoin);
        }

        game.black_player_id = Some(joiner.id.clone());
        game.status = GameStatus::Active;
        game.current_turn = Side::White;
        game.updated_at = Utc::now();

        let commit = GameCommit::new(game);
        self.games.commit(&commit).await?;
        info!("Player {} joined game {}", joiner.id, game_id);

        self.build_view(&commit.game, Some(&joiner.id)).await
    }

    pub async fn apply_move(
        &self,
        game_id: &str,
        mover_id: &str,
        notation: &str,
    ) -> Result<GameView, GameSessionServiceError> {
        let _guard = self.locks.acquire(game_id).await;
        let mut game = self.load_game(game_id).await?;
        require_status(&game, GameStatus::Active)?;

        let mover_side = game
            .player_side(mover_id)
            .ok_or_else(|| GameSessionServiceError::NotAParticipant(mover_id.to_string()))?;
        let position = self.rule_authority.load_position(&game.current_position)?;
        if position.side_to_move() != mover_side {
            return Err(GameSessionServiceError::OutOfTurn {
                side_to_move: position.side_to_move(),
            });
        }

        let chess_move = self.resolver.resolve(notation, position.as_ref())?;
        let next = position.apply(&chess_move)?;
        drop(position);

        let history = self.moves.find_by_game(game_id).await?;
        let move_number = history.len() as u32 + 1;
        let encoded = next.encode();
        let record = MoveRecord::new(
            game_id,
            move_number,
            notation,
            &chess_move.to_string(),
            &encoded,
        );
        debug!(
            "Game {}: move {} {} ({}) by {}",
            game_id, move_number, notation, chess_move, mover_side
        );

        let mut earlier_positions = vec![self.rule_authority.starting_position()];
        earlier_positions.extend(history.into_iter().map(|m| m.position_after));
        let signals = DrawSignals::from_position(next.as_ref(), &earlier_positions);
        let checkmated = next.is_checkmated();
        let side_to_move = next.side_to_move();
        drop(next);

        game.current_position = encoded;
        game.current_turn = side_to_move;
        game.updated_at = Utc::now();

        if checkmated {
            game.status = GameStatus::win_for(mover_side);
            info!("Game {} ended by checkmate: {}", game_id, game.status);
        } else if let Some(reason) = self
            .draw_detector
            .classify(&game.current_position, &signals)
        {
            game.status = GameStatus::Draw;
            info!("Game {} drawn ({:?})", game_id, reason);
        }

        let game = if game.status.is_terminal() {
            self.commit_finished(game, Some(record)).await?
        } else {
            let commit = GameCommit::new(game).with_move(record);
            self.games.commit(&commit).await?;
            commit.game
        };

        self.build_view(&game, Some(mover_id)).await
    }

    pub async fn offer_draw(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<GameView, GameSessionServiceError> {
        let _guard = self.locks.acquire(game_id).await;
        let mut game = self.load_game(game_id).await?;
        require_status(&game, GameStatus::Active)?;
        require_participant(&game, player_id)?;

        game.draw_offered_by = Some(player_id.to_string());
        game.updated_at = Utc::now();

        let commit = GameCommit::new(game);
        self.games.commit(&commit).await?;
        info!("Draw offered in game {} by {}", game_id, player_id);

        self.build_view(&commit.game, Some(player_id)).await
    }

    pub async fn respond_to_draw(
        &self,
        game_id: &str,
        player_id: &str,
        accept: bool,
    ) -> Result<GameView, GameSessionServiceError> {
        let _guard = self.locks.acquire(game_id).await;
        let mut game = self.load_game(game_id).await?;

        let holder = game
            .draw_offered_by
            .clone()
            .ok_or(GameSessionServiceError::NoDrawOffered)?;
        if holder == player_id {
            return Err(GameSessionServiceError::SelfResponse);
        }
        require_participant(&game, player_id)?;
        require_status(&game, GameStatus::Active)?;

        game.draw_offered_by = None;
        game.updated_at = Utc::now();
        let game = if accept {
            game.status = GameStatus::Draw;
            info!("Draw agreed in game {}", game_id);
            self.commit_finished(game, None).await?
        } else {
            info!("Draw offer in game {} declined by {}", game_id, player_id);
            let commit = GameCommit::new(game);
            self.games.commit(&commit).await?;
            commit.game
        };

        self.build_view(&game, Some(player_id)).await
    }

    pub async fn get_game(
        &self,
        game_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<GameView, GameSessionServiceError> {
        let game = self.load_game(game_id).await?;
        self.build_view(&game, viewer_id).await
    }

    /// Games still waiting for an opponent that were opened within the last hour.
    pub async fn list_waiting_games(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WaitingGame>, GameSessionServiceError> {
        let since = now - Duration::hours(LOBBY_WINDOW_HOURS);
        let mut games = self.games.find_waiting_games_created_after(since).await?;
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut lobby = Vec::with_capacity(games.len());
        for game in games {
            let white_player_name = self
                .players
                .get_player(&game.white_player_id)
                .await?
                .map(|p| p.display_name)
                .unwrap_or_else(|| game.white_player_id.clone());
            lobby.push(WaitingGame {
                game_id: game.game_id,
                white_player_name,
                created_at: game.created_at,
            });
        }
        Ok(lobby)
    }

    pub async fn move_history(
        &self,
        game_id: &str,
    ) -> Result<Vec<MoveRecord>, GameSessionServiceError> {
        self.load_game(game_id).await?;
        Ok(self.moves.find_by_game(game_id).await?)
    }

    async fn load_game(&self, game_id: &str) -> Result<Game, GameSessionServiceError> {
        self.games
            .get_game(game_id)
            .await?
            .ok_or_else(|| GameSessionServiceError::GameNotFound(game_id.to_string()))
    }

    /// Clears any pending offer, rates the result and commits it. Players are
    /// written conditioned on the version they were read at; when another game
    /// of theirs finished in between, they are re-read and rated again.
    async fn commit_finished(
        &self,
        mut game: Game,
        record: Option<MoveRecord>,
    ) -> Result<Game, GameSessionServiceError> {
        game.draw_offered_by = None;
        let mut attempt = 1;
        loop {
            let players = self.rate(&game).await?;
            let mut commit = GameCommit::new(game.clone()).with_players(players);
            if let Some(record) = &record {
                commit = commit.with_move(record.clone());
            }

            match self.games.commit(&commit).await {
                Ok(()) => return Ok(commit.game),
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_FINISH_ATTEMPTS => {
                    let stored = self.load_game(&game.game_id).await?;
                    if stored.version != game.version {
                        return Err(RepositoryError::Conflict(reason).into());
                    }
                    warn!(
                        "Retrying finish of game {} (attempt {}): {}",
                        game.game_id, attempt, reason
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn rate(&self, game: &Game) -> Result<Vec<Player>, GameSessionServiceError> {
        let white = self.players.get_player(&game.white_player_id).await?;
        let black = match &game.black_player_id {
            Some(black_id) => self.players.get_player(black_id).await?,
            None => None,
        };
        Ok(self.rating_updater.apply(game, white, black))
    }

    async fn build_view(
        &self,
        game: &Game,
        viewer_id: Option<&str>,
    ) -> Result<GameView, GameSessionServiceError> {
        let position = self.rule_authority.load_position(&game.current_position)?;
        let viewer_side = viewer_id.and_then(|id| game.player_side(id));
        let side_to_move = position.side_to_move();

        let mut legal_moves = Vec::new();
        if game.status == GameStatus::Active && viewer_side == Some(side_to_move) {
            legal_moves = position
                .legal_moves()
                .iter()
                .map(|m| m.to_string())
                .collect();
            legal_moves.sort();
        }
        let annotation = annotate(game, position.as_ref());
        drop(position);

        let white_player = self.summary(Some(&game.white_player_id)).await?;
        let black_player = self.summary(game.black_player_id.as_deref()).await?;
        let move_count = self.moves.count_by_game(&game.game_id).await?;

        Ok(GameView {
            game_id: game.game_id.clone(),
            status: game.status,
            annotation,
            side_to_move,
            viewer_side,
            white_player,
            black_player,
            move_count,
            position: game.current_position.clone(),
            legal_moves,
            draw_offered_by: game.draw_offered_by.clone(),
            created_at: game.created_at,
        })
    }

    async fn summary(
        &self,
        player_id: Option<&str>,
    ) -> Result<Option<PlayerSummary>, GameSessionServiceError> {
        match player_id {
            Some(id) => Ok(self
                .players
                .get_player(id)
                .await?
                .as_ref()
                .map(PlayerSummary::from)),
            None => Ok(None),
        }
    }
}

fn require_status(game: &Game, expected: GameStatus) -> Result<(), GameSessionServiceError> {
    if game.status != expected {
        return Err(GameSessionServiceError::InvalidState {
            expected,
            actual: game.status,
        });
    }
    Ok(())
}

fn require_participant(game: &Game, player_id: &str) -> Result<(), GameSessionServiceError> {
    if !game.is_participant(player_id) {
        return Err(GameSessionServiceError::NotAParticipant(
            player_id.to_string(),
        ));
    }
    Ok(())
}

fn annotate(game: &Game, position: &dyn Position) -> PositionAnnotation {
    if position.is_checkmated() {
        PositionAnnotation::Checkmate
    } else if position.is_stalemated() {
        PositionAnnotation::Stalemate
    } else if game.status == GameStatus::Draw {
        PositionAnnotation::Draw
    } else if position.is_in_check() {
        PositionAnnotation::Check
    } else {
        PositionAnnotation::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::DEFAULT_RATING;
    use crate::repositories::errors::repository_errors::RepositoryError;
    use crate::repositories::game_repository::MockGameRepository;
    use crate::repositories::memory_repository::InMemoryRepository;
    use crate::services::chess_service::{ChessRuleAuthority, STARTING_POSITION};
    use crate::services::errors::notation_errors::NotationError;
    use async_trait::async_trait;

    /// Delegates to an in-memory store but stalls the reads that race.
    struct SlowRepository {
        inner: Arc<InMemoryRepository>,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl GameRepository for SlowRepository {
        async fn create_game(&self, game: &Game) -> Result<(), RepositoryError> {
            self.inner.create_game(game).await
        }

        async fn get_game(&self, game_id: &str) -> Result<Option<Game>, RepositoryError> {
            self.inner.get_game(game_id).await
        }

        async fn find_active_games_by_player(
            &self,
            player_id: &str,
        ) -> Result<Vec<Game>, RepositoryError> {
            let games = self.inner.find_active_games_by_player(player_id).await;
            tokio::time::sleep(self.delay).await;
            games
        }

        async fn find_waiting_games_created_after(
            &self,
            since: DateTime<Utc>,
        ) -> Result<Vec<Game>, RepositoryError> {
            self.inner.find_waiting_games_created_after(since).await
        }

        async fn find_waiting_games_created_before(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Game>, RepositoryError> {
            self.inner.find_waiting_games_created_before(cutoff).await
        }

        async fn find_finished_games_updated_before(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Game>, RepositoryError> {
            self.inner.find_finished_games_updated_before(cutoff).await
        }

        async fn commit(&self, commit: &GameCommit) -> Result<(), RepositoryError> {
            self.inner.commit(commit).await
        }

        async fn delete_game(&self, game: &Game) -> Result<(), RepositoryError> {
            self.inner.delete_game(game).await
        }
    }

    #[async_trait]
    impl PlayerRepository for SlowRepository {
        async fn get_or_create_player(
            &self,
            player_id: &str,
            display_name: &str,
        ) -> Result<Player, RepositoryError> {
            self.inner.get_or_create_player(player_id, display_name).await
        }

        async fn get_player(&self, player_id: &str) -> Result<Option<Player>, RepositoryError> {
            let player = self.inner.get_player(player_id).await;
            tokio::time::sleep(self.delay).await;
            player
        }
    }

    fn slow_service(repo: Arc<InMemoryRepository>) -> GameSessionService {
        let slow = Arc::new(SlowRepository {
            inner: repo.clone(),
            delay: std::time::Duration::from_millis(20),
        });
        GameSessionService::new(
            slow.clone(),
            slow,
            repo,
            Arc::new(ChessRuleAuthority::new()),
            GameLocks::new(),
        )
    }

    fn service_with(repo: Arc<InMemoryRepository>) -> GameSessionService {
        GameSessionService::new(
            repo.clone(),
            repo.clone(),
            repo,
            Arc::new(ChessRuleAuthority::new()),
            GameLocks::new(),
        )
    }

    async fn active_game() -> (GameSessionService, Arc<InMemoryRepository>, String) {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service_with(repo.clone());
        let created = service.create_game("alice", "Alice").await.unwrap();
        service
            .join_game(&created.game_id, "bob", "Bob")
            .await
            .unwrap();
        (service, repo, created.game_id)
    }

    async fn set_position(repo: &InMemoryRepository, game_id: &str, fen: &str) {
        let mut game = repo.get_game(game_id).await.unwrap().unwrap();
        game.current_position = fen.to_string();
        repo.commit(&GameCommit::new(game)).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_game() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service_with(repo.clone());

        let view = service.create_game("alice", "Alice").await.unwrap();

        assert_eq!(view.status, GameStatus::Waiting);
        assert_eq!(view.viewer_side, Some(Side::White));
        assert_eq!(view.position, STARTING_POSITION);
        assert_eq!(view.move_count, 0);
        assert!(view.black_player.is_none());
        let white = view.white_player.unwrap();
        assert_eq!(white.display_name, "Alice");
        assert_eq!(white.rating, DEFAULT_RATING);
        assert!(view.legal_moves.is_empty());
    }

    #[tokio::test]
    async fn test_create_game_rejects_player_with_open_game() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service_with(repo);
        let first = service.create_game("alice", "Alice").await.unwrap();

        let result = service.create_game("alice", "Alice").await;

        match result {
            Err(GameSessionServiceError::AlreadyInActiveGame(game_id)) => {
                assert_eq!(game_id, first.game_id)
            }
            other => panic!("Expected AlreadyInActiveGame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_game() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service_with(repo);
        let created = service.create_game("alice", "Alice").await.unwrap();

        let view = service
            .join_game(&created.game_id, "bob", "Bob")
            .await
            .unwrap();

        assert_eq!(view.status, GameStatus::Active);
        assert_eq!(view.viewer_side, Some(Side::Black));
        assert_eq!(view.side_to_move, Side::White);
        assert_eq!(view.black_player.unwrap().id, "bob");
        assert!(view.legal_moves.is_empty());
    }

    #[tokio::test]
    async fn test_join_rejections() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service_with(repo);
        let created = service.create_game("alice", "Alice").await.unwrap();

        assert!(matches!(
            service.join_game(&created.game_id, "alice", "Alice").await,
            Err(GameSessionServiceError::SelfJoin)
        ));

        service
            .join_game(&created.game_id, "bob", "Bob")
            .await
            .unwrap();
        assert!(matches!(
            service.join_game(&created.game_id, "carol", "Carol").await,
            Err(GameSessionServiceError::InvalidState {
                expected: GameStatus::Waiting,
                actual: GameStatus::Active
            })
        ));
        assert!(matches!(
            service.join_game("missing", "carol", "Carol").await,
            Err(GameSessionServiceError::GameNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_sequence_and_rejections() {
        let (service, _, game_id) = active_game().await;

        let view = service.apply_move(&game_id, "alice", "e2e4").await.unwrap();
        assert_eq!(view.move_count, 1);
        assert_eq!(view.side_to_move, Side::Black);

        let rejected = service.apply_move(&game_id, "bob", "e2e4").await;
        assert!(matches!(
            rejected,
            Err(GameSessionServiceError::IllegalMove(
                NotationError::NoLegalCandidate(_)
            ))
        ));

        let out_of_turn = service.apply_move(&game_id, "alice", "d2d4").await;
        assert!(matches!(
            out_of_turn,
            Err(GameSessionServiceError::OutOfTurn {
                side_to_move: Side::Black
            })
        ));

        let outsider = service.apply_move(&game_id, "carol", "e7e5").await;
        assert!(matches!(
            outsider,
            Err(GameSessionServiceError::NotAParticipant(_))
        ));

        let unchanged = service.get_game(&game_id, Some("bob")).await.unwrap();
        assert_eq!(unchanged.move_count, 1);
        assert_eq!(unchanged.side_to_move, Side::Black);
        assert_eq!(unchanged.position, view.position);
        assert_eq!(unchanged.legal_moves.len(), 20);

        service.apply_move(&game_id, "bob", "e5").await.unwrap();
        let history = service.move_history(&game_id).await.unwrap();
        let numbers: Vec<u32> = history.iter().map(|m| m.move_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(history[1].notation, "e5");
        assert_eq!(history[1].uci, "e7e5");
    }

    #[tokio::test]
    async fn test_move_before_join_is_rejected() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service_with(repo);
        let created = service.create_game("alice", "Alice").await.unwrap();

        let result = service.apply_move(&created.game_id, "alice", "e4").await;

        assert!(matches!(
            result,
            Err(GameSessionServiceError::InvalidState {
                expected: GameStatus::Active,
                actual: GameStatus::Waiting
            })
        ));
    }

    #[tokio::test]
    async fn test_checkmate_rates_players() {
        let (service, repo, game_id) = active_game().await;
        for (player, notation) in [("alice", "f3"), ("bob", "e5"), ("alice", "g4")] {
            service.apply_move(&game_id, player, notation).await.unwrap();
        }
        service.offer_draw(&game_id, "alice").await.unwrap();

        let view = service.apply_move(&game_id, "bob", "Qh4#").await.unwrap();

        assert_eq!(view.status, GameStatus::BlackWin);
        assert_eq!(view.annotation, PositionAnnotation::Checkmate);
        assert!(view.draw_offered_by.is_none());
        let alice = repo.get_player("alice").await.unwrap().unwrap();
        let bob = repo.get_player("bob").await.unwrap().unwrap();
        assert_eq!((alice.rating, alice.games_played, alice.games_lost), (1180, 1, 1));
        assert_eq!((bob.rating, bob.games_played, bob.games_won), (1220, 1, 1));

        assert!(matches!(
            service.apply_move(&game_id, "alice", "e4").await,
            Err(GameSessionServiceError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_insufficient_material_draw() {
        let (service, repo, game_id) = active_game().await;
        set_position(&repo, &game_id, "8/8/8/4k3/8/2n5/3B4/4K3 w - - 0 40").await;

        let view = service.apply_move(&game_id, "alice", "Bxc3").await.unwrap();

        assert_eq!(view.status, GameStatus::Draw);
        for id in ["alice", "bob"] {
            let player = repo.get_player(id).await.unwrap().unwrap();
            assert_eq!(player.rating, 1205);
            assert_eq!(player.games_drawn, 1);
        }
    }

    #[tokio::test]
    async fn test_check_is_annotation_only() {
        let (service, _, game_id) = active_game().await;
        for (player, notation) in [("alice", "e4"), ("bob", "f6"), ("alice", "Qh5+")] {
            service.apply_move(&game_id, player, notation).await.unwrap();
        }

        let view = service.get_game(&game_id, None).await.unwrap();

        assert_eq!(view.status, GameStatus::Active);
        assert_eq!(view.annotation, PositionAnnotation::Check);
        assert!(view.viewer_side.is_none());
        assert!(view.legal_moves.is_empty());
    }

    #[tokio::test]
    async fn test_draw_offer_flow() {
        let (service, repo, game_id) = active_game().await;

        assert!(matches!(
            service.respond_to_draw(&game_id, "bob", true).await,
            Err(GameSessionServiceError::NoDrawOffered)
        ));
        assert!(matches!(
            service.offer_draw(&game_id, "carol").await,
            Err(GameSessionServiceError::NotAParticipant(_))
        ));

        let offered = service.offer_draw(&game_id, "alice").await.unwrap();
        assert_eq!(offered.draw_offered_by.as_deref(), Some("alice"));
        assert!(matches!(
            service.respond_to_draw(&game_id, "alice", true).await,
            Err(GameSessionServiceError::SelfResponse)
        ));
        assert!(matches!(
            service.respond_to_draw(&game_id, "carol", true).await,
            Err(GameSessionServiceError::NotAParticipant(_))
        ));

        let declined = service.respond_to_draw(&game_id, "bob", false).await.unwrap();
        assert_eq!(declined.status, GameStatus::Active);
        assert!(declined.draw_offered_by.is_none());

        service.offer_draw(&game_id, "bob").await.unwrap();
        let accepted = service.respond_to_draw(&game_id, "alice", true).await.unwrap();
        assert_eq!(accepted.status, GameStatus::Draw);
        assert_eq!(accepted.annotation, PositionAnnotation::Draw);
        assert_eq!(repo.get_player("alice").await.unwrap().unwrap().rating, 1205);
    }

    #[tokio::test]
    async fn test_concurrent_moves_on_one_game_are_serialized() {
        let (service, repo, game_id) = active_game().await;
        let service = Arc::new(service);

        let first = tokio::spawn({
            let service = service.clone();
            let game_id = game_id.clone();
            async move { service.apply_move(&game_id, "alice", "e4").await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            let game_id = game_id.clone();
            async move { service.apply_move(&game_id, "alice", "d4").await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(GameSessionServiceError::OutOfTurn { .. })
        )));
        assert_eq!(repo.count_by_game(&game_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_waiting_games() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = service_with(repo.clone());
        let open = service.create_game("alice", "Alice").await.unwrap();
        let joined = service.create_game("carol", "Carol").await.unwrap();
        service
            .join_game(&joined.game_id, "bob", "Bob")
            .await
            .unwrap();

        let lobby = service.list_waiting_games(Utc::now()).await.unwrap();
        assert_eq!(lobby.len(), 1);
        assert_eq!(lobby[0].game_id, open.game_id);
        assert_eq!(lobby[0].white_player_name, "Alice");

        let later = Utc::now() + Duration::hours(2);
        assert!(service.list_waiting_games(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_is_reported() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut game = Game::new("alice", STARTING_POSITION);
        game.black_player_id = Some("bob".to_string());
        game.status = GameStatus::Active;
        let stored = game.clone();

        let mut games = MockGameRepository::new();
        games
            .expect_get_game()
            .returning(move |_| Ok(Some(stored.clone())));
        games
            .expect_commit()
            .times(1)
            .returning(|_| Err(RepositoryError::Conflict("stale".to_string())));

        let service = GameSessionService::new(
            Arc::new(games),
            repo.clone(),
            repo.clone(),
            Arc::new(ChessRuleAuthority::new()),
            GameLocks::new(),
        );

        let result = service.apply_move(&game.game_id, "alice", "e4").await;

        assert!(matches!(
            result,
            Err(GameSessionServiceError::RepositoryError(
                RepositoryError::Conflict(_)
            ))
        ));
        assert_eq!(repo.count_by_game(&game.game_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_finishes_keep_both_rating_updates() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = slow_service(repo.clone());
        let first = service.create_game("alice", "Alice").await.unwrap().game_id;
        let second = service.create_game("carol", "Carol").await.unwrap().game_id;
        service.join_game(&first, "bob", "Bob").await.unwrap();
        service.join_game(&second, "bob", "Bob").await.unwrap();
        service.offer_draw(&first, "alice").await.unwrap();
        service.offer_draw(&second, "carol").await.unwrap();

        let (a, b) = tokio::join!(
            service.respond_to_draw(&first, "bob", true),
            service.respond_to_draw(&second, "bob", true)
        );

        assert_eq!(a.unwrap().status, GameStatus::Draw);
        assert_eq!(b.unwrap().status, GameStatus::Draw);
        let bob = repo.get_player("bob").await.unwrap().unwrap();
        assert_eq!((bob.games_played, bob.games_drawn), (2, 2));
        assert_eq!(bob.rating, 1210);
        for id in ["alice", "carol"] {
            let player = repo.get_player(id).await.unwrap().unwrap();
            assert_eq!((player.games_played, player.rating), (1, 1205));
        }
    }

    #[tokio::test]
    async fn test_concurrent_creates_by_one_player_open_one_game() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = slow_service(repo.clone());

        let (first, second) = tokio::join!(
            service.create_game("dave", "Dave"),
            service.create_game("dave", "Dave")
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(GameSessionServiceError::AlreadyInActiveGame(_))
        )));
        assert_eq!(repo.find_active_games_by_player("dave").await.unwrap().len(), 1);
        assert!(service.creation_locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entries_do_not_accumulate() {
        let (service, _, game_id) = active_game().await;

        for i in 0..1000 {
            let result = service.apply_move(&format!("missing-{}", i), "alice", "e4").await;
            assert!(matches!(result, Err(GameSessionServiceError::GameNotFound(_))));
        }
        assert!(service.locks.is_empty());

        service.offer_draw(&game_id, "alice").await.unwrap();
        service.respond_to_draw(&game_id, "bob", true).await.unwrap();
        assert!(service.locks.is_empty());
    }

    #[tokio::test]
    async fn test_with_dynamodb_builds_service() {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .region(aws_sdk_dynamodb::config::Region::new("eu-west-2"))
            .build();
        let tables = TableConfig {
            games_table: "games".to_string(),
            players_table: "players".to_string(),
            moves_table: "moves".to_string(),
        };

        let service = GameSessionService::with_dynamodb(
            Client::from_conf(config),
            &tables,
            Arc::new(ChessRuleAuthority::new()),
            GameLocks::new(),
        );

        assert!(service.locks.is_empty());
    }
}
