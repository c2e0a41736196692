use std::sync::Arc;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use uuid::Uuid;

use league_engine::config::settings::EngineSettings;
use league_engine::db::MemoryLeagueStore;
use league_engine::models::league::{CreateSeasonRequest, League, SeasonSchedule};
use league_engine::telemetry::{get_subscriber, init_subscriber};
use league_engine::LeagueService;

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::stdout
        );
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::sink
        );
        init_subscriber(subscriber);
    }
});

pub struct TestLeague {
    pub service: LeagueService<MemoryLeagueStore>,
    pub league: League,
}

pub async fn spawn_league() -> TestLeague {
    spawn_league_with(EngineSettings::default()).await
}

pub async fn spawn_league_with(settings: EngineSettings) -> TestLeague {
    Lazy::force(&TRACING);

    let service = LeagueService::new(Arc::new(MemoryLeagueStore::new()), settings);
    let league = service
        .create_league("Test League", None)
        .await
        .expect("Failed to create league");

    TestLeague { service, league }
}

impl TestLeague {
    pub async fn create_season(&self, team_ids: &[Uuid]) -> SeasonSchedule {
        let (start_date, end_date) = season_window();
        self.service
            .create_season(CreateSeasonRequest {
                league_id: self.league.id,
                name: "Test Season".to_string(),
                start_date,
                end_date,
                team_ids: team_ids.to_vec(),
            })
            .await
            .expect("Failed to create season")
    }
}

/// Deterministic ids so the final tie-break is predictable
pub fn team_ids(count: u128) -> Vec<Uuid> {
    (1..=count).map(Uuid::from_u128).collect()
}

pub fn season_window() -> (DateTime<Utc>, DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap(),
    )
}
