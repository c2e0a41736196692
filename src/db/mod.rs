//! Persistence collaborators for the league engine.
//!
//! Every write that touches the matches or the table of one league season
//! goes through [`LeagueStore`], which guarantees a single writer per
//! season and all-or-nothing table replacement. Seasons never contend with
//! each other.

use async_trait::async_trait;
use uuid::Uuid;

use crate::league::error::LeagueError;
use crate::models::league::*;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLeagueStore;
pub use postgres::PgLeagueStore;

#[async_trait]
pub trait LeagueStore: Send + Sync {
    async fn create_league(&self, league: &League) -> Result<(), LeagueError>;

    async fn league(&self, league_id: Uuid) -> Result<Option<League>, LeagueError>;

    /// Insert the season, its roster, one `scheduled` match per fixture and
    /// a zeroed table row per roster team, in one transaction.
    async fn create_season(
        &self,
        season: &LeagueSeason,
        roster: &[Uuid],
        fixtures: &[Fixture],
    ) -> Result<Vec<LeagueMatch>, LeagueError>;

    /// Every `(league_id, season_id)` pair known to the store
    async fn seasons(&self) -> Result<Vec<(Uuid, Uuid)>, LeagueError>;

    /// All matches of a season, any status, in kickoff order
    async fn matches(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<LeagueMatch>, LeagueError>;

    /// Read-modify-write of one match under its season's write lock.
    /// Nothing is written when `update` fails.
    async fn update_match_with<F>(&self, match_id: Uuid, update: F) -> Result<LeagueMatch, LeagueError>
    where
        F: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError> + Send + 'static;

    /// Take the season's write lock, read a consistent snapshot, run
    /// `compute` and replace the stored table with its output. The old table
    /// survives untouched if anything fails.
    async fn recompute_with<F>(
        &self,
        league_id: Uuid,
        season_id: Uuid,
        compute: F,
    ) -> Result<Vec<TeamSeasonAggregate>, LeagueError>
    where
        F: FnOnce(&SeasonSnapshot) -> Result<Vec<TeamSeasonAggregate>, LeagueError> + Send + 'static;

    /// `update_match_with` and `recompute_with` as one unit: the match
    /// change and the rebuilt table of its season are written together under
    /// one lock, or not at all. `compute` sees the snapshot with the updated
    /// match already in place.
    async fn report_with<U, C>(
        &self,
        match_id: Uuid,
        update: U,
        compute: C,
    ) -> Result<(LeagueMatch, Vec<TeamSeasonAggregate>), LeagueError>
    where
        U: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError> + Send + 'static,
        C: FnOnce(&SeasonSnapshot) -> Result<Vec<TeamSeasonAggregate>, LeagueError> + Send + 'static;

    /// Stored table rows ordered by position
    async fn standings(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<TeamSeasonAggregate>, LeagueError>;

    /// Remove the league with its seasons, matches and table rows.
    /// Returns `false` if the league did not exist.
    async fn delete_league(&self, league_id: Uuid) -> Result<bool, LeagueError>;
}
