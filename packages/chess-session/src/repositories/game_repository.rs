use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde_dynamo::{from_item, to_attribute_value, to_item};

use crate::config::TableConfig;
use crate::models::game::{Game, GameStatus};
use crate::models::move_record::MoveRecord;
use crate::models::player::Player;
use crate::repositories::errors::repository_errors::RepositoryError;

#[cfg(test)]
use mockall::automock;

/// A rated player and the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerWrite {
    pub player: Player,
    pub expected_version: u64,
}

/// Everything one session operation writes. Applied all-or-nothing: the game
/// is only replaced while its stored version still equals `expected_version`,
/// and each player only while its stored version equals the one it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct GameCommit {
    pub game: Game,
    pub expected_version: u64,
    pub new_move: Option<MoveRecord>,
    pub players: Vec<PlayerWrite>,
}

impl GameCommit {
    /// Bumps the game's version and remembers the one it was read at.
    pub fn new(mut game: Game) -> Self {
        let expected_version = game.version;
        game.version += 1;
        GameCommit {
            game,
            expected_version,
            new_move: None,
            players: Vec::new(),
        }
    }

    pub fn with_move(mut self, record: MoveRecord) -> Self {
        self.new_move = Some(record);
        self
    }

    /// Bumps each player's version, like `new` does for the game.
    pub fn with_players(mut self, players: Vec<Player>) -> Self {
        self.players = players
            .into_iter()
            .map(|mut player| {
                let expected_version = player.version;
                player.version += 1;
                PlayerWrite {
                    player,
                    expected_version,
                }
            })
            .collect();
        self
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn create_game(&self, game: &Game) -> Result<(), RepositoryError>;

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, RepositoryError>;

    /// Waiting or Active games the player takes part in.
    async fn find_active_games_by_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<Game>, RepositoryError>;

    async fn find_waiting_games_created_after(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError>;

    async fn find_waiting_games_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError>;

    async fn find_finished_games_updated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError>;

    async fn commit(&self, commit: &GameCommit) -> Result<(), RepositoryError>;

    /// Removes the game if it has not changed since it was read.
    async fn delete_game(&self, game: &Game) -> Result<(), RepositoryError>;
}

pub struct DynamoDbGameRepository {
    pub client: Client,
    pub tables: TableConfig,
}

impl DynamoDbGameRepository {
    pub fn new(client: Client, tables: TableConfig) -> Self {
        Self { client, tables }
    }

    async fn scan_games(
        &self,
        filter_expression: &str,
        values: HashMap<String, AttributeValue>,
    ) -> Result<Vec<Game>, RepositoryError> {
        let mut games = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.tables.games_table)
                .filter_expression(filter_expression)
                .expression_attribute_names("#status", "status")
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let game: Game =
                    from_item(item).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
                games.push(game);
            }

            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(games)
    }

    async fn scan_by_status(
        &self,
        statuses: &[GameStatus],
    ) -> Result<Vec<Game>, RepositoryError> {
        let mut values = HashMap::new();
        let mut placeholders = Vec::new();
        for (index, status) in statuses.iter().enumerate() {
            let placeholder = format!(":status{}", index);
            values.insert(placeholder.clone(), attribute(status)?);
            placeholders.push(placeholder);
        }
        let filter = format!("#status IN ({})", placeholders.join(", "));
        self.scan_games(&filter, values).await
    }

    fn game_put(&self, commit: &GameCommit) -> Result<TransactWriteItem, RepositoryError> {
        let item = to_item(&commit.game).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let put = Put::builder()
            .table_name(&self.tables.games_table)
            .set_item(Some(item))
            .condition_expression("version = :expected")
            .expression_attribute_values(":expected", attribute(&commit.expected_version)?)
            .build()
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn move_put(&self, record: &MoveRecord) -> Result<TransactWriteItem, RepositoryError> {
        let item = to_item(record).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let put = Put::builder()
            .table_name(&self.tables.moves_table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(move_number)")
            .build()
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn player_put(&self, write: &PlayerWrite) -> Result<TransactWriteItem, RepositoryError> {
        let item =
            to_item(&write.player).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let put = Put::builder()
            .table_name(&self.tables.players_table)
            .set_item(Some(item))
            .condition_expression("version = :expected")
            .expression_attribute_values(":expected", attribute(&write.expected_version)?)
            .build()
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }
}

fn attribute<T: serde::Serialize + ?Sized>(value: &T) -> Result<AttributeValue, RepositoryError> {
    to_attribute_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn conflict_or_dynamo(error: String, game_id: &str) -> RepositoryError {
    if error.contains("ConditionalCheckFailed") || error.contains("TransactionCanceled") {
        RepositoryError::Conflict(format!("game {} was modified concurrently", game_id))
    } else {
        RepositoryError::DynamoDb(error)
    }
}

#[async_trait]
impl GameRepository for DynamoDbGameRepository {
    async fn create_game(&self, game: &Game) -> Result<(), RepositoryError> {
        let item = to_item(game).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        self.client
            .put_item()
            .table_name(&self.tables.games_table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(game_id)")
            .send()
            .await
            .map_err(|e| conflict_or_dynamo(e.to_string(), &game.game_id))?;
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, RepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.tables.games_table)
            .key("game_id", attribute(game_id)?)
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        match output.item {
            Some(item) => {
                let game: Game =
                    from_item(item).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
                Ok(Some(game))
            }
            None => Ok(None),
        }
    }

    async fn find_active_games_by_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<Game>, RepositoryError> {
        let mut values = HashMap::new();
        values.insert(":player".to_string(), attribute(player_id)?);
        values.insert(":waiting".to_string(), attribute(&GameStatus::Waiting)?);
        values.insert(":active".to_string(), attribute(&GameStatus::Active)?);
        self.scan_games(
            "(white_player_id = :player OR black_player_id = :player) AND #status IN (:waiting, :active)",
            values,
        )
        .await
    }

    // Timestamps are compared here rather than in the filter expression since
    // their stored form does not sort reliably as text.
    async fn find_waiting_games_created_after(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError> {
        let games = self.scan_by_status(&[GameStatus::Waiting]).await?;
        Ok(games.into_iter().filter(|g| g.created_at > since).collect())
    }

    async fn find_waiting_games_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError> {
        let games = self.scan_by_status(&[GameStatus::Waiting]).await?;
        Ok(games.into_iter().filter(|g| g.created_at < cutoff).collect())
    }

    async fn find_finished_games_updated_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Game>, RepositoryError> {
        let games = self.scan_by_status(&GameStatus::TERMINAL).await?;
        Ok(games.into_iter().filter(|g| g.updated_at < cutoff).collect())
    }

    async fn commit(&self, commit: &GameCommit) -> Result<(), RepositoryError> {
        let mut items = vec![self.game_put(commit)?];
        if let Some(record) = &commit.new_move {
            items.push(self.move_put(record)?);
        }
        for write in &commit.players {
            items.push(self.player_put(write)?);
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| conflict_or_dynamo(e.to_string(), &commit.game.game_id))?;
        Ok(())
    }

    async fn delete_game(&self, game: &Game) -> Result<(), RepositoryError> {
        let delete = Delete::builder()
            .table_name(&self.tables.games_table)
            .key("game_id", attribute(&game.game_id)?)
            .condition_expression("version = :expected")
            .expression_attribute_values(":expected", attribute(&game.version)?)
            .build()
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        self.client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().delete(delete).build())
            .send()
            .await
            .map_err(|e| conflict_or_dynamo(e.to_string(), &game.game_id))?;
        Ok(())
    }
}
