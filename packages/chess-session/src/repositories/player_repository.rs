use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_attribute_value, to_item};
use tracing::info;

use crate::config::TableConfig;
use crate::models::player::Player;
use crate::repositories::errors::repository_errors::RepositoryError;

#[cfg(test)]
use mockall::automock;

/// Rating changes are written through `GameCommit`, never directly.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Returns the stored player, creating one with default stats on first sight.
    async fn get_or_create_player(
        &self,
        player_id: &str,
        display_name: &str,
    ) -> Result<Player, RepositoryError>;

    async fn get_player(&self, player_id: &str) -> Result<Option<Player>, RepositoryError>;
}

pub struct DynamoDbPlayerRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbPlayerRepository {
    pub fn new(client: Client, tables: &TableConfig) -> Self {
        Self {
            client,
            table_name: tables.players_table.clone(),
        }
    }
}

#[async_trait]
impl PlayerRepository for DynamoDbPlayerRepository {
    async fn get_or_create_player(
        &self,
        player_id: &str,
        display_name: &str,
    ) -> Result<Player, RepositoryError> {
        if let Some(player) = self.get_player(player_id).await? {
            return Ok(player);
        }

        let player = Player::new(player_id, display_name);
        let item = to_item(&player).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => {
                info!("Created player {}", player_id);
                Ok(player)
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("ConditionalCheckFailed") {
                    // Created concurrently; the stored record wins.
                    self.get_player(player_id)
                        .await?
                        .ok_or(RepositoryError::NotFound)
                } else {
                    Err(RepositoryError::DynamoDb(error_str))
                }
            }
        }
    }

    async fn get_player(&self, player_id: &str) -> Result<Option<Player>, RepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "id",
                to_attribute_value(player_id)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
            )
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = output.item {
            let player: Player =
                from_item(item).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            Ok(Some(player))
        } else {
            Ok(None)
        }
    }
}
