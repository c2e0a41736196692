use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::db::LeagueStore;
use crate::league::error::LeagueError;
use crate::models::league::*;

type SeasonKey = (Uuid, Uuid);

#[derive(Debug)]
struct SeasonState {
    roster: Vec<Uuid>,
    matches: Vec<LeagueMatch>,
    standings: Vec<TeamSeasonAggregate>,
}

/// In-process store. Each season sits behind its own async mutex, which
/// is the single-writer lock; the registries are only held long enough to
/// look a season up.
#[derive(Debug, Default)]
pub struct MemoryLeagueStore {
    leagues: RwLock<HashMap<Uuid, League>>,
    seasons: RwLock<HashMap<SeasonKey, Arc<Mutex<SeasonState>>>>,
    match_index: RwLock<HashMap<Uuid, SeasonKey>>,
}

impl MemoryLeagueStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn season_handle(&self, key: SeasonKey) -> Option<Arc<Mutex<SeasonState>>> {
        self.seasons.read().await.get(&key).cloned()
    }

    async fn match_handle(&self, match_id: Uuid) -> Result<(SeasonKey, Arc<Mutex<SeasonState>>), LeagueError> {
        let key = self
            .match_index
            .read()
            .await
            .get(&match_id)
            .copied()
            .ok_or(LeagueError::MatchNotFound(match_id))?;
        let handle = self
            .season_handle(key)
            .await
            .ok_or(LeagueError::MatchNotFound(match_id))?;
        Ok((key, handle))
    }
}

fn apply_update<F>(current: &LeagueMatch, update: F) -> Result<LeagueMatch, LeagueError>
where
    F: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError>,
{
    let mut updated = update(current.clone())?;
    // identity and pairing are fixed at generation time
    updated.id = current.id;
    updated.league_id = current.league_id;
    updated.season_id = current.season_id;
    updated.home_team_id = current.home_team_id;
    updated.away_team_id = current.away_team_id;
    Ok(updated)
}

#[async_trait]
impl LeagueStore for MemoryLeagueStore {
    async fn create_league(&self, league: &League) -> Result<(), LeagueError> {
        self.leagues.write().await.insert(league.id, league.clone());
        Ok(())
    }

    async fn league(&self, league_id: Uuid) -> Result<Option<League>, LeagueError> {
        Ok(self.leagues.read().await.get(&league_id).cloned())
    }

    async fn create_season(
        &self,
        season: &LeagueSeason,
        roster: &[Uuid],
        fixtures: &[Fixture],
    ) -> Result<Vec<LeagueMatch>, LeagueError> {
        let matches: Vec<LeagueMatch> = fixtures
            .iter()
            .map(|fixture| LeagueMatch::scheduled(season.league_id, season.id, fixture))
            .collect();

        let standings = TeamSeasonAggregate::opening_table(season.league_id, season.id, roster);

        let key = (season.league_id, season.id);
        let state = SeasonState {
            roster: roster.to_vec(),
            matches: matches.clone(),
            standings,
        };

        let mut seasons = self.seasons.write().await;
        let mut index = self.match_index.write().await;
        for game in &matches {
            index.insert(game.id, key);
        }
        seasons.insert(key, Arc::new(Mutex::new(state)));

        Ok(matches)
    }

    async fn seasons(&self) -> Result<Vec<(Uuid, Uuid)>, LeagueError> {
        let mut keys: Vec<SeasonKey> = self.seasons.read().await.keys().copied().collect();
        keys.sort();
        Ok(keys)
    }

    async fn matches(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<LeagueMatch>, LeagueError> {
        let Some(handle) = self.season_handle((league_id, season_id)).await else {
            return Ok(Vec::new());
        };
        let mut matches = handle.lock().await.matches.clone();
        matches.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn update_match_with<F>(&self, match_id: Uuid, update: F) -> Result<LeagueMatch, LeagueError>
    where
        F: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError> + Send + 'static,
    {
        let (_, handle) = self.match_handle(match_id).await?;

        let mut state = handle.lock().await;
        let slot = state
            .matches
            .iter_mut()
            .find(|m| m.id == match_id)
            .ok_or(LeagueError::MatchNotFound(match_id))?;

        let updated = apply_update(slot, update)?;
        *slot = updated.clone();
        Ok(updated)
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
        let unknown = || LeagueError::UnknownLeague { league_id, season_id };

        let points = self.league(league_id).await?.ok_or_else(unknown)?.points;
        let handle = self.season_handle((league_id, season_id)).await.ok_or_else(unknown)?;

        let mut state = handle.lock().await;
        let snapshot = SeasonSnapshot {
            league_id,
            season_id,
            points,
            roster: state.roster.clone(),
            matches: state.matches.clone(),
        };

        // no await between computing and storing the table
        let table = compute(&snapshot)?;
        state.standings = table.clone();

        Ok(table)
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
        let ((league_id, season_id), handle) = self.match_handle(match_id).await?;
        let points = self
            .league(league_id)
            .await?
            .ok_or(LeagueError::UnknownLeague { league_id, season_id })?
            .points;

        let mut state = handle.lock().await;
        let index = state
            .matches
            .iter()
            .position(|m| m.id == match_id)
            .ok_or(LeagueError::MatchNotFound(match_id))?;

        let updated = apply_update(&state.matches[index], update)?;
        let mut matches = state.matches.clone();
        matches[index] = updated.clone();

        let snapshot = SeasonSnapshot {
            league_id,
            season_id,
            points,
            roster: state.roster.clone(),
            matches,
        };
        let table = compute(&snapshot)?;

        // both writes happen only after everything above succeeded
        state.matches = snapshot.matches;
        state.standings = table.clone();

        Ok((updated, table))
    }

    async fn standings(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
        let handle = self
            .season_handle((league_id, season_id))
            .await
            .ok_or(LeagueError::UnknownLeague { league_id, season_id })?;
        let mut table = handle.lock().await.standings.clone();
        table.sort_by_key(|row| row.position);
        Ok(table)
    }

    async fn delete_league(&self, league_id: Uuid) -> Result<bool, LeagueError> {
        let existed = self.leagues.write().await.remove(&league_id).is_some();

        let mut seasons = self.seasons.write().await;
        let mut index = self.match_index.write().await;
        seasons.retain(|(league, _), _| *league != league_id);
        index.retain(|_, (league, _)| *league != league_id);

        Ok(existed)
    }
}
