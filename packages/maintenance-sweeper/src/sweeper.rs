use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use chess_session::config::CleanupPolicy;
use chess_session::services::maintenance_service::{CleanupReport, MaintenanceService};
use chrono::{DateTime, Utc};
use lambda_runtime::Error;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct MaintenanceSweeper {
    maintenance_service: MaintenanceService,
    policy: CleanupPolicy,
}

impl MaintenanceSweeper {
    pub fn new(maintenance_service: MaintenanceService, policy: CleanupPolicy) -> Self {
        Self {
            maintenance_service,
            policy,
        }
    }

    pub async fn process_event(&self, event: CloudWatchEvent) -> Result<CleanupReport, Error> {
        debug!(
            "Sweeper triggered by {:?} ({:?})",
            event.source, event.detail_type
        );

        let now = sweep_time(event.time);
        info!("Running cleanup as of {}", now);

        let report = self
            .maintenance_service
            .cleanup_old_games(now, &self.policy)
            .await;
        if report.failures > 0 {
            warn!("{} cleanup items failed and will be retried next run", report.failures);
        }

        Ok(report)
    }
}

/// Scheduled events carry their trigger time; an absent one deserializes to the epoch.
fn sweep_time(event_time: DateTime<Utc>) -> DateTime<Utc> {
    if event_time.timestamp() == 0 {
        Utc::now()
    } else {
        event_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_session::models::game::{Game, GameStatus};
    use chess_session::repositories::game_repository::GameRepository;
    use chess_session::repositories::memory_repository::InMemoryRepository;
    use chess_session::services::chess_service::STARTING_POSITION;
    use chess_session::services::game_locks::GameLocks;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn scheduled_event(time: &str) -> CloudWatchEvent {
        serde_json::from_value(json!({
            "version": "0",
            "id": "53dc4d37-cffa-4f76-80c9-8b7d4a4d2eaa",
            "detail-type": "Scheduled Event",
            "source": "aws.events",
            "account": "123456789012",
            "time": time,
            "region": "eu-west-2",
            "resources": ["arn:aws:events:eu-west-2:123456789012:rule/chess-maintenance"],
            "detail": {}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_event_time_drives_cleanup() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut waiting = Game::new("white", STARTING_POSITION);
        let event_time: DateTime<Utc> = "2025-03-10T06:00:00Z".parse().unwrap();
        waiting.created_at = event_time - Duration::days(8);
        waiting.updated_at = waiting.created_at;
        repo.create_game(&waiting).await.unwrap();

        let sweeper = MaintenanceSweeper::new(
            MaintenanceService::new(repo.clone(), repo.clone(), GameLocks::new()),
            CleanupPolicy::default(),
        );

        let report = sweeper
            .process_event(scheduled_event("2025-03-10T06:00:00Z"))
            .await
            .unwrap();

        assert_eq!(report.waiting_deleted, 1);
        assert!(repo.get_game(&waiting.game_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_games_survive() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut finished = Game::new("white", STARTING_POSITION);
        finished.status = GameStatus::Draw;
        finished.black_player_id = Some("black".to_string());
        repo.create_game(&finished).await.unwrap();

        let sweeper = MaintenanceSweeper::new(
            MaintenanceService::new(repo.clone(), repo.clone(), GameLocks::new()),
            CleanupPolicy::default(),
        );
        let report = sweeper
            .process_event(scheduled_event(&Utc::now().to_rfc3339()))
            .await
            .unwrap();

        assert_eq!(report, CleanupReport::default());
        assert!(!repo.get_game(&finished.game_id).await.unwrap().unwrap().archived);
    }

    #[test]
    fn test_missing_time_falls_back_to_now() {
        let before = Utc::now();
        let now = sweep_time(DateTime::<Utc>::default());

        assert!(now >= before);
    }
}
