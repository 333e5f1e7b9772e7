use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;

mod sweeper;
use chess_session::{
    config::{CleanupPolicy, TableConfig},
    repositories::{
        game_repository::DynamoDbGameRepository, move_repository::DynamoDbMoveRepository,
    },
    services::{game_locks::GameLocks, maintenance_service::MaintenanceService},
};
use sweeper::MaintenanceSweeper;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let tables = TableConfig::from_env()?;
    let policy = CleanupPolicy::from_env()?;

    let config = aws_config::load_from_env().await;
    let client = aws_sdk_dynamodb::Client::new(&config);

    let game_repository = Arc::new(DynamoDbGameRepository::new(client.clone(), tables.clone()));
    let move_repository = Arc::new(DynamoDbMoveRepository::new(client.clone(), &tables));
    let maintenance_service =
        MaintenanceService::new(game_repository, move_repository, GameLocks::new());

    let sweeper = MaintenanceSweeper::new(maintenance_service, policy);

    run(service_fn(move |event: LambdaEvent<CloudWatchEvent>| {
        let sweeper = sweeper.clone();
        async move { sweeper.process_event(event.payload).await }
    }))
    .await
}
