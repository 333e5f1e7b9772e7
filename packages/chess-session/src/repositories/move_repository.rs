use async_trait::async_trait;
use aws_sdk_dynamodb::types::Select;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_attribute_value};
use tracing::debug;

use crate::config::TableConfig;
use crate::models::move_record::MoveRecord;
use crate::repositories::errors::repository_errors::RepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MoveRepository: Send + Sync {
    async fn count_by_game(&self, game_id: &str) -> Result<u32, RepositoryError>;

    /// All moves of a game, ordered by move number.
    async fn find_by_game(&self, game_id: &str) -> Result<Vec<MoveRecord>, RepositoryError>;

    /// Returns how many records were removed.
    async fn delete_by_game(&self, game_id: &str) -> Result<usize, RepositoryError>;
}

/// Moves are keyed by `game_id` (partition) and `move_number` (sort).
pub struct DynamoDbMoveRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMoveRepository {
    pub fn new(client: Client, tables: &TableConfig) -> Self {
        Self {
            client,
            table_name: tables.moves_table.clone(),
        }
    }
}

#[async_trait]
impl MoveRepository for DynamoDbMoveRepository {
    async fn count_by_game(&self, game_id: &str) -> Result<u32, RepositoryError> {
        let mut count = 0;
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("game_id = :game_id")
                .expression_attribute_values(
                    ":game_id",
                    to_attribute_value(game_id)
                        .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
                )
                .select(Select::Count)
                .consistent_read(true)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            count += u32::try_from(output.count).unwrap_or_default();
            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(count)
    }

    async fn find_by_game(&self, game_id: &str) -> Result<Vec<MoveRecord>, RepositoryError> {
        let mut records = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("game_id = :game_id")
                .expression_attribute_values(
                    ":game_id",
                    to_attribute_value(game_id)
                        .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
                )
                .scan_index_forward(true)
                .consistent_read(true)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let record: MoveRecord =
                    from_item(item).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
                records.push(record);
            }

            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        records.sort_by_key(|record| record.move_number);
        Ok(records)
    }

    async fn delete_by_game(&self, game_id: &str) -> Result<usize, RepositoryError> {
        let records = self.find_by_game(game_id).await?;

        for record in &records {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key(
                    "game_id",
                    to_attribute_value(&record.game_id)
                        .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
                )
                .key(
                    "move_number",
                    to_attribute_value(record.move_number)
                        .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
                )
                .send()
                .await
                .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;
        }

        debug!("Deleted {} moves of game {}", records.len(), game_id);
        Ok(records.len())
    }
}
