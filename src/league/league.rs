use std::sync::Arc;
use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;
use crate::config::settings::EngineSettings;
use crate::db::LeagueStore;
use crate::league::error::LeagueError;
use crate::league::schedule::{generate_fixtures, total_rounds, ScheduleStatistics};
use crate::league::standings::StandingsCalculator;
use crate::league::validation::{validate_scores, LeagueValidator};
use crate::models::league::*;

/// Main league service that orchestrates fixture generation, result
/// reporting and standings recomputation against a store.
pub struct LeagueService<S> {
    store: Arc<S>,
    settings: EngineSettings,
    validator: LeagueValidator,
}

/// Outcome of a repair pass over every stored season
#[derive(Debug, Default)]
pub struct RepairReport {
    pub repaired: usize,
    pub failures: Vec<(Uuid, Uuid, LeagueError)>,
}

impl<S> Clone for LeagueService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
            validator: self.validator.clone(),
        }
    }
}

impl<S: LeagueStore> LeagueService<S> {
    pub fn new(store: Arc<S>, settings: EngineSettings) -> Self {
        let validator = LeagueValidator::with_max_teams(settings.max_teams);
        Self {
            store,
            settings,
            validator,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a league; without an explicit schedule the configured default applies
    #[tracing::instrument(skip(self))]
    pub async fn create_league(
        &self,
        name: &str,
        points: Option<PointSchedule>,
    ) -> Result<League, LeagueError> {
        let league = League {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            points: points.unwrap_or(self.settings.default_points),
            created_at: Utc::now(),
        };
        self.store.create_league(&league).await?;
        Ok(league)
    }

    /// Create a new league season: generate the double round-robin and
    /// persist it together with a zeroed table.
    #[tracing::instrument(skip(self, request), fields(league_id = %request.league_id))]
    pub async fn create_season(
        &self,
        request: CreateSeasonRequest,
    ) -> Result<SeasonSchedule, LeagueError> {
        if let Err(e) = self.validator.validate_create_season_request(&request) {
            tracing::warn!("Rejected season request ({}): {}", request, e);
            return Err(e);
        }

        self.store
            .league(request.league_id)
            .await?
            .ok_or(LeagueError::LeagueNotFound(request.league_id))?;

        let fixtures = generate_fixtures(&request.team_ids, request.start_date, request.end_date)?;

        let season = LeagueSeason {
            id: Uuid::new_v4(),
            league_id: request.league_id,
            name: request.name.trim().to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            created_at: Utc::now(),
        };

        let matches = self
            .store
            .create_season(&season, &request.team_ids, &fixtures)
            .await?;

        tracing::info!(
            "Created season '{}' with {} teams, running from {} to {}",
            season.name,
            request.team_ids.len(),
            season.start_date,
            season.end_date
        );

        Ok(SeasonSchedule {
            season,
            matches,
            total_rounds: total_rounds(request.team_ids.len()),
        })
    }

    /// Move a scheduled match to `in_progress`
    pub async fn mark_in_progress(&self, match_id: Uuid) -> Result<LeagueMatch, LeagueError> {
        self.store
            .update_match_with(match_id, move |mut game| {
                if game.status != MatchStatus::Scheduled {
                    return Err(LeagueError::InvalidTransition {
                        match_id: game.id,
                        from: game.status,
                        to: MatchStatus::InProgress,
                    });
                }
                game.status = MatchStatus::InProgress;
                game.updated_at = Utc::now();
                Ok(game)
            })
            .await
    }

    /// Record a final score, postponement or cancellation and rebuild the
    /// table of the match's season in the same store transaction. Returns
    /// the new table. On any failure, timeout included, neither the match
    /// nor the table changes, so the report can simply be retried.
    #[tracing::instrument(skip(self))]
    pub async fn report_result(
        &self,
        match_id: Uuid,
        report: ResultReport,
    ) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
        // Validate scores before touching the store
        if let ResultReport::Final { home_score, away_score } = report {
            validate_scores(match_id, home_score, away_score)?;
        }

        let validator = self.validator.clone();
        let calculator = standings_calculator(self.settings.form_length);
        let work = self.store.report_with(
            match_id,
            move |game| {
                validator.validate_result_report(&game, &report)?;
                Ok(apply_report(game, report))
            },
            calculator,
        );

        let (game, table) = match self.within_budget(work).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Failed to report result for match {}: {}", match_id, e);
                return Err(e);
            }
        };

        tracing::info!(
            "🏆 Match {} is now {}: {:?} - {:?} (home team: {}, away team: {}), {} teams in the table",
            game.id,
            game.status,
            game.home_score,
            game.away_score,
            game.home_team_id,
            game.away_team_id,
            table.len()
        );

        Ok(table)
    }

    /// Rebuild a season's table from scratch inside the store's write lock.
    /// Safe to call at any time; the result only depends on the matches.
    #[tracing::instrument(skip(self))]
    pub async fn recompute_standings(
        &self,
        league_id: Uuid,
        season_id: Uuid,
    ) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
        let calculator = standings_calculator(self.settings.form_length);
        let work = self.store.recompute_with(league_id, season_id, calculator);

        match self.within_budget(work).await {
            Ok(table) => {
                tracing::info!("Recomputed standings for {} teams", table.len());
                Ok(table)
            }
            Err(e) => {
                tracing::error!("Failed to recompute standings: {}", e);
                Err(e)
            }
        }
    }

    /// Recompute every stored season. Seasons are independent, so they run
    /// concurrently; one failure does not stop the others.
    pub async fn repair_all(&self) -> Result<RepairReport, LeagueError> {
        let seasons = self.store.seasons().await?;
        tracing::info!("Repairing standings for {} seasons", seasons.len());

        let results = join_all(seasons.iter().map(|&(league_id, season_id)| async move {
            (league_id, season_id, self.recompute_standings(league_id, season_id).await)
        }))
        .await;

        let mut report = RepairReport::default();
        for (league_id, season_id, result) in results {
            match result {
                Ok(_) => report.repaired += 1,
                Err(e) => report.failures.push((league_id, season_id, e)),
            }
        }

        Ok(report)
    }

    /// Run a store write under the configured budget. On timeout the write
    /// future is dropped, which rolls its transaction back.
    async fn within_budget<T>(
        &self,
        work: impl std::future::Future<Output = Result<T, LeagueError>>,
    ) -> Result<T, LeagueError> {
        match self.settings.recompute_budget() {
            Some(budget) => match tokio::time::timeout(budget, work).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Store write timed out after {:?}, nothing was applied", budget);
                    Err(LeagueError::Timeout { budget })
                }
            },
            None => work.await,
        }
    }

    pub async fn standings(
        &self,
        league_id: Uuid,
        season_id: Uuid,
    ) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
        self.store.standings(league_id, season_id).await
    }

    pub async fn matches(
        &self,
        league_id: Uuid,
        season_id: Uuid,
    ) -> Result<Vec<LeagueMatch>, LeagueError> {
        self.store.matches(league_id, season_id).await
    }

    pub async fn schedule_statistics(
        &self,
        league_id: Uuid,
        season_id: Uuid,
    ) -> Result<ScheduleStatistics, LeagueError> {
        let matches = self.store.matches(league_id, season_id).await?;
        Ok(ScheduleStatistics::from_matches(&matches))
    }

    /// Delete a league and everything derived from it
    pub async fn delete_league(&self, league_id: Uuid) -> Result<(), LeagueError> {
        if !self.store.delete_league(league_id).await? {
            return Err(LeagueError::LeagueNotFound(league_id));
        }
        Ok(())
    }
}

/// Table computation run inside the store's lock, with the league's own
/// point schedule taken from the snapshot.
fn standings_calculator(
    form_length: usize,
) -> impl Fn(&SeasonSnapshot) -> Result<Vec<TeamSeasonAggregate>, LeagueError> + Send + 'static {
    move |snapshot| {
        StandingsCalculator::new(snapshot.points)
            .with_form_length(form_length)
            .recompute(snapshot)
    }
}

fn apply_report(mut game: LeagueMatch, report: ResultReport) -> LeagueMatch {
    game.status = report.target_status();
    match report {
        ResultReport::Final { home_score, away_score } => {
            game.home_score = Some(home_score);
            game.away_score = Some(away_score);
        }
        ResultReport::Postponed | ResultReport::Cancelled => {
            game.home_score = None;
            game.away_score = None;
        }
    }
    game.updated_at = Utc::now();
    game
}
