use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;

use league_engine::config::settings::EngineSettings;
use league_engine::db::{LeagueStore, MemoryLeagueStore};
use league_engine::league::ErrorKind;
use league_engine::models::league::*;
use league_engine::{recompute_standings, LeagueError, LeagueService};

mod common;
use common::utils::{season_window, spawn_league, spawn_league_with, team_ids};

fn final_score(home_score: i32, away_score: i32) -> ResultReport {
    ResultReport::Final { home_score, away_score }
}

#[tokio::test]
async fn new_season_starts_with_a_zeroed_table() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(6)).await;

    assert_eq!(schedule.matches.len(), 30);
    assert_eq!(schedule.total_rounds, 10);
    assert!(schedule.matches.iter().all(|m| m.status == MatchStatus::Scheduled));

    let table = app.service.standings(app.league.id, schedule.season.id).await.unwrap();
    assert_eq!(table.len(), 6);
    for (index, row) in table.iter().enumerate() {
        assert_eq!(row.position, index as i32 + 1);
        assert_eq!((row.matches_played, row.points), (0, 0));
    }

    // the stored opening table is exactly what a recomputation produces
    let rebuilt = app
        .service
        .recompute_standings(app.league.id, schedule.season.id)
        .await
        .unwrap();
    assert_eq!(rebuilt, table);
}

#[tokio::test]
async fn reporting_a_result_updates_the_table() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(4)).await;
    let game = &schedule.matches[0];

    let table = app.service.report_result(game.id, final_score(2, 1)).await.unwrap();

    assert_eq!(table[0].team_id, game.home_team_id);
    assert_eq!(table[0].points, 3);
    assert_eq!(table[0].form_string, "W");
    let loser = table.iter().find(|r| r.team_id == game.away_team_id).unwrap();
    assert_eq!((loser.points, loser.goal_difference, loser.position), (0, -1, 4));

    let stored = app.service.standings(app.league.id, schedule.season.id).await.unwrap();
    assert_eq!(stored, table);

    let matches = app.service.matches(app.league.id, schedule.season.id).await.unwrap();
    let updated = matches.iter().find(|m| m.id == game.id).unwrap();
    assert_eq!(updated.status, MatchStatus::Completed);
    assert_eq!((updated.home_score, updated.away_score), (Some(2), Some(1)));
}

#[tokio::test]
async fn completed_matches_cannot_be_reported_again() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(4)).await;
    let match_id = schedule.matches[0].id;

    app.service.report_result(match_id, final_score(1, 0)).await.unwrap();

    let err = app
        .service
        .report_result(match_id, final_score(0, 3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LeagueError::InvalidTransition { from: MatchStatus::Completed, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::InputValidation);

    let matches = app.service.matches(app.league.id, schedule.season.id).await.unwrap();
    let game = matches.iter().find(|m| m.id == match_id).unwrap();
    assert_eq!((game.home_score, game.away_score), (Some(1), Some(0)));
}

#[tokio::test]
async fn negative_scores_are_rejected_before_any_write() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(4)).await;
    let match_id = schedule.matches[0].id;

    let err = app
        .service
        .report_result(match_id, final_score(-1, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, LeagueError::NegativeScore { home_score: -1, away_score: 2, .. }));

    let matches = app.service.matches(app.league.id, schedule.season.id).await.unwrap();
    assert!(matches.iter().all(|m| m.status == MatchStatus::Scheduled));
}

#[tokio::test]
async fn a_failed_table_rebuild_leaves_the_match_unreported() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(2)).await;
    let (first, second) = (&schedule.matches[0], &schedule.matches[1]);

    app.service.report_result(first.id, final_score(i32::MAX, 0)).await.unwrap();

    // the return leg pushes the same team's goal total past i32::MAX
    let err = app
        .service
        .report_result(second.id, final_score(0, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, LeagueError::TallyOverflow { match_id, .. } if match_id == second.id));
    assert_eq!(err.kind(), ErrorKind::Consistency);

    let matches = app.service.matches(app.league.id, schedule.season.id).await.unwrap();
    let stored = matches.iter().find(|m| m.id == second.id).unwrap();
    assert_eq!(stored.status, MatchStatus::Scheduled);
    assert_eq!((stored.home_score, stored.away_score), (None, None));

    let table = app.service.standings(app.league.id, schedule.season.id).await.unwrap();
    assert_eq!(table.iter().map(|r| r.matches_played).sum::<i32>(), 2);
}

#[tokio::test]
async fn postponed_matches_can_still_be_played() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(4)).await;
    let game = &schedule.matches[1];

    let table = app.service.report_result(game.id, ResultReport::Postponed).await.unwrap();
    assert!(table.iter().all(|r| r.matches_played == 0));

    let table = app.service.report_result(game.id, final_score(0, 0)).await.unwrap();
    for team_id in [game.home_team_id, game.away_team_id] {
        let row = table.iter().find(|r| r.team_id == team_id).unwrap();
        assert_eq!((row.drawn, row.points, row.clean_sheets), (1, 1, 1));
    }
}

#[tokio::test]
async fn cancelled_matches_never_count() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(4)).await;
    let match_id = schedule.matches[2].id;

    let table = app.service.report_result(match_id, ResultReport::Cancelled).await.unwrap();
    assert!(table.iter().all(|r| r.matches_played == 0 && r.points == 0));

    let err = app
        .service
        .report_result(match_id, final_score(1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, LeagueError::InvalidTransition { from: MatchStatus::Cancelled, .. }));
}

#[tokio::test]
async fn kicked_off_matches_move_to_in_progress_once() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(3)).await;
    let match_id = schedule.matches[0].id;

    let game = app.service.mark_in_progress(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::InProgress);

    assert!(matches!(
        app.service.mark_in_progress(match_id).await,
        Err(LeagueError::InvalidTransition { from: MatchStatus::InProgress, to: MatchStatus::InProgress, .. })
    ));

    app.service.report_result(match_id, final_score(4, 2)).await.unwrap();
    let stats = app.service.schedule_statistics(app.league.id, schedule.season.id).await.unwrap();
    assert_eq!(stats.completed_games, 1);
    assert_eq!(stats.live_games, 0);
}

#[tokio::test]
async fn unknown_ids_are_reported_as_not_found() {
    let app = spawn_league().await;

    let missing = Uuid::new_v4();
    let err = app.service.report_result(missing, final_score(1, 0)).await.unwrap_err();
    assert!(matches!(err, LeagueError::MatchNotFound(id) if id == missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = app
        .service
        .recompute_standings(app.league.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, LeagueError::UnknownLeague { .. }));

    let (start_date, end_date) = season_window();
    let err = app
        .service
        .create_season(CreateSeasonRequest {
            league_id: missing,
            name: "Orphan".into(),
            start_date,
            end_date,
            team_ids: team_ids(4),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LeagueError::LeagueNotFound(id) if id == missing));
}

#[tokio::test]
async fn invalid_season_requests_are_rejected() {
    let app = spawn_league_with(EngineSettings {
        max_teams: 6,
        ..EngineSettings::default()
    })
    .await;
    let (start_date, end_date) = season_window();
    let request = |team_ids: Vec<Uuid>| CreateSeasonRequest {
        league_id: app.league.id,
        name: "Spring".into(),
        start_date,
        end_date,
        team_ids,
    };

    assert!(matches!(
        app.service.create_season(request(team_ids(7))).await,
        Err(LeagueError::TooManyTeams { count: 7, max: 6 })
    ));
    assert!(matches!(
        app.service.create_season(request(team_ids(1))).await,
        Err(LeagueError::InsufficientTeams { count: 1 })
    ));

    let mut reversed = request(team_ids(4));
    reversed.end_date = start_date;
    assert!(matches!(
        app.service.create_season(reversed).await,
        Err(LeagueError::InvalidWindow { .. })
    ));

    assert!(app.service.store().seasons().await.unwrap().is_empty());
}

#[tokio::test]
async fn league_point_schedule_drives_the_table() {
    let app = spawn_league().await;
    let points = PointSchedule {
        points_for_win: 2,
        points_for_draw: 1,
        points_for_loss: 0,
    };
    let league = app.service.create_league("Two Points", Some(points)).await.unwrap();
    let (start_date, end_date) = season_window();
    let schedule = app
        .service
        .create_season(CreateSeasonRequest {
            league_id: league.id,
            name: "Classic".into(),
            start_date,
            end_date,
            team_ids: team_ids(2),
        })
        .await
        .unwrap();

    let table = app
        .service
        .report_result(schedule.matches[0].id, final_score(3, 0))
        .await
        .unwrap();
    assert_eq!(table[0].points, 2);
    assert_eq!(table[0].form_points, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reports_leave_a_consistent_table() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(8)).await;

    let tasks = schedule.matches.iter().enumerate().map(|(i, game)| {
        let service = app.service.clone();
        let match_id = game.id;
        tokio::spawn(async move {
            let report = final_score((i % 4) as i32, (i % 3) as i32);
            service.report_result(match_id, report).await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let stored = app.service.standings(app.league.id, schedule.season.id).await.unwrap();
    let played: i32 = stored.iter().map(|r| r.matches_played).sum();
    assert_eq!(played as usize, schedule.matches.len() * 2);

    // whichever recomputation ran last, it saw every result
    let snapshot = SeasonSnapshot {
        league_id: app.league.id,
        season_id: schedule.season.id,
        points: app.league.points,
        roster: team_ids(8),
        matches: app.service.matches(app.league.id, schedule.season.id).await.unwrap(),
    };
    assert_eq!(stored, recompute_standings(&snapshot).unwrap());
}

#[tokio::test]
async fn repair_rebuilds_every_season() {
    let app = spawn_league().await;
    let first = app.create_season(&team_ids(4)).await;
    let second = app.create_season(&team_ids(5)).await;

    app.service.report_result(first.matches[0].id, final_score(1, 0)).await.unwrap();
    app.service.report_result(second.matches[3].id, final_score(2, 2)).await.unwrap();

    let report = app.service.repair_all().await.unwrap();
    assert_eq!(report.repaired, 2);
    assert!(report.failures.is_empty());

    let table = app.service.standings(app.league.id, second.season.id).await.unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.iter().filter(|r| r.drawn == 1).count(), 2);
}

#[tokio::test]
async fn deleting_a_league_removes_its_seasons() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(4)).await;

    app.service.delete_league(app.league.id).await.unwrap();

    assert!(app.service.matches(app.league.id, schedule.season.id).await.unwrap().is_empty());
    assert!(matches!(
        app.service.standings(app.league.id, schedule.season.id).await,
        Err(LeagueError::UnknownLeague { .. })
    ));
    assert!(matches!(
        app.service.delete_league(app.league.id).await,
        Err(LeagueError::LeagueNotFound(_))
    ));
}

#[tokio::test]
async fn schedule_statistics_track_progress() {
    let app = spawn_league().await;
    let schedule = app.create_season(&team_ids(3)).await;
    let ids: Vec<Uuid> = schedule.matches.iter().map(|m| m.id).collect();

    app.service.report_result(ids[0], final_score(1, 0)).await.unwrap();
    app.service.report_result(ids[1], ResultReport::Postponed).await.unwrap();
    app.service.report_result(ids[2], ResultReport::Cancelled).await.unwrap();

    let stats = app.service.schedule_statistics(app.league.id, schedule.season.id).await.unwrap();
    assert_eq!(stats.total_games, 6);
    assert_eq!(stats.completed_games, 1);
    assert_eq!(stats.postponed_games, 1);
    assert_eq!(stats.cancelled_games, 1);
    assert_eq!(stats.upcoming_games, 3);
}

/// Store whose table writes stall while `slow` is set
struct SlowStore {
    inner: MemoryLeagueStore,
    delay: Duration,
    slow: AtomicBool,
}

impl SlowStore {
    async fn stall(&self) {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl LeagueStore for SlowStore {
    async fn create_league(&self, league: &League) -> Result<(), LeagueError> {
        self.inner.create_league(league).await
    }

    async fn league(&self, league_id: Uuid) -> Result<Option<League>, LeagueError> {
        self.inner.league(league_id).await
    }

    async fn create_season(
        &self,
        season: &LeagueSeason,
        roster: &[Uuid],
        fixtures: &[Fixture],
    ) -> Result<Vec<LeagueMatch>, LeagueError> {
        self.inner.create_season(season, roster, fixtures).await
    }

    async fn seasons(&self) -> Result<Vec<(Uuid, Uuid)>, LeagueError> {
        self.inner.seasons().await
    }

    async fn matches(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<LeagueMatch>, LeagueError> {
        self.inner.matches(league_id, season_id).await
    }

    async fn update_match_with<F>(&self, match_id: Uuid, update: F) -> Result<LeagueMatch, LeagueError>
    where
        F: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError> + Send + 'static,
    {
        self.inner.update_match_with(match_id, update).await
    }

    async fn recompute_with<F>(
        &self,
        league_id: Uuid,
        season_id: Uuid,
        compute: F,
    ) -> Result<Vec<TeamSeasonAggregate>, LeagueError>
    where
        F: FnOnce(&SeasonSnapshot) -> Result<Vec<TeamSeasonAggregate>, LeagueError> + Send + 'static,
    {
        self.stall().await;
        self.inner.recompute_with(league_id, season_id, compute).await
    }

    async fn report_with<U, C>(
        &self,
        match_id: Uuid,
        update: U,
        compute: C,
    ) -> Result<(LeagueMatch, Vec<TeamSeasonAggregate>), LeagueError>
    where
        U: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError> + Send + 'static,
        C: FnOnce(&SeasonSnapshot) -> Result<Vec<TeamSeasonAggregate>, LeagueError> + Send + 'static,
    {
        self.stall().await;
        self.inner.report_with(match_id, update, compute).await
    }

    async fn standings(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
        self.inner.standings(league_id, season_id).await
    }

    async fn delete_league(&self, league_id: Uuid) -> Result<bool, LeagueError> {
        self.inner.delete_league(league_id).await
    }
}

#[tokio::test]
async fn timed_out_reports_change_nothing_and_can_be_retried() {
    let settings = EngineSettings {
        recompute_timeout_ms: 20,
        ..EngineSettings::default()
    };
    let store = Arc::new(SlowStore {
        inner: MemoryLeagueStore::new(),
        delay: Duration::from_millis(500),
        slow: AtomicBool::new(true),
    });
    let service = LeagueService::new(Arc::clone(&store), settings);

    let league = service.create_league("Slow League", None).await.unwrap();
    let (start_date, end_date) = season_window();
    let schedule = service
        .create_season(CreateSeasonRequest {
            league_id: league.id,
            name: "Slow Season".into(),
            start_date,
            end_date,
            team_ids: team_ids(4),
        })
        .await
        .unwrap();
    let opening = service.standings(league.id, schedule.season.id).await.unwrap();
    let match_id = schedule.matches[0].id;

    let err = service
        .report_result(match_id, final_score(3, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, LeagueError::Timeout { budget } if budget == Duration::from_millis(20)));
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // neither the match nor the table moved
    assert_eq!(service.standings(league.id, schedule.season.id).await.unwrap(), opening);
    let matches = service.matches(league.id, schedule.season.id).await.unwrap();
    assert!(matches.iter().all(|m| m.status == MatchStatus::Scheduled));

    assert!(matches!(
        service.recompute_standings(league.id, schedule.season.id).await,
        Err(LeagueError::Timeout { .. })
    ));

    // the same report goes through once the store keeps up again
    store.slow.store(false, Ordering::SeqCst);
    let table = service.report_result(match_id, final_score(3, 0)).await.unwrap();
    assert_eq!(table[0].team_id, schedule.matches[0].home_team_id);
    assert_eq!(table[0].points, 3);
    assert_eq!(service.standings(league.id, schedule.season.id).await.unwrap(), table);
}
