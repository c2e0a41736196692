use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::db::LeagueStore;
use crate::league::error::LeagueError;
use crate::models::league::*;

const MATCH_COLUMNS: &str = r#"
    id, league_id, season_id, home_team_id, away_team_id, kickoff, round,
    is_first_leg, status, home_score, away_score, updated_at
"#;

const AGGREGATE_COLUMNS: &str = r#"
    team_id, league_id, season_id, matches_played, won, drawn, lost,
    goals_for, goals_against, goal_difference, points, clean_sheets,
    form_points, form_string, position
"#;

/// Postgres-backed store.
///
/// Every transaction that writes matches or table rows of a season first
/// takes `pg_advisory_xact_lock` on that season, so writers of one season
/// run one at a time and each later statement sees everything the previous
/// writer committed. The lock is released on commit or rollback.
#[derive(Debug, Clone)]
pub struct PgLeagueStore {
    pool: PgPool,
}

impl PgLeagueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn lock_season(
    tx: &mut Transaction<'_, Postgres>,
    league_id: Uuid,
    season_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || ':' || $2::text, 0))")
        .bind(league_id)
        .bind(season_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_aggregates(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[TeamSeasonAggregate],
) -> Result<(), sqlx::Error> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO team_season_aggregates ({}) ", AGGREGATE_COLUMNS));
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.team_id)
            .push_bind(row.league_id)
            .push_bind(row.season_id)
            .push_bind(row.matches_played)
            .push_bind(row.won)
            .push_bind(row.drawn)
            .push_bind(row.lost)
            .push_bind(row.goals_for)
            .push_bind(row.goals_against)
            .push_bind(row.goal_difference)
            .push_bind(row.points)
            .push_bind(row.clean_sheets)
            .push_bind(row.form_points)
            .push_bind(row.form_string.clone())
            .push_bind(row.position);
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

/// Resolve the season of a match and take that season's writer lock.
async fn lock_match_season(
    tx: &mut Transaction<'_, Postgres>,
    match_id: Uuid,
) -> Result<(Uuid, Uuid), LeagueError> {
    let (league_id, season_id) = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT league_id, season_id FROM league_matches WHERE id = $1",
    )
    .bind(match_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(LeagueError::MatchNotFound(match_id))?;

    lock_season(tx, league_id, season_id).await?;
    Ok((league_id, season_id))
}

/// Read-modify-write of one match row. Only the status, scores and kickoff
/// are written back.
async fn write_match_update<F>(
    tx: &mut Transaction<'_, Postgres>,
    match_id: Uuid,
    update: F,
) -> Result<LeagueMatch, LeagueError>
where
    F: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError>,
{
    let current = sqlx::query_as::<_, LeagueMatch>(&format!(
        "SELECT {} FROM league_matches WHERE id = $1 FOR UPDATE",
        MATCH_COLUMNS
    ))
    .bind(match_id)
    .fetch_one(&mut **tx)
    .await?;

    let mut updated = update(current)?;
    updated.updated_at = Utc::now();

    let stored = sqlx::query_as::<_, LeagueMatch>(&format!(
        r#"
        UPDATE league_matches
        SET status = $1,
            home_score = $2,
            away_score = $3,
            kickoff = $4,
            updated_at = $5
        WHERE id = $6
        RETURNING {}
        "#,
        MATCH_COLUMNS
    ))
    .bind(updated.status)
    .bind(updated.home_score)
    .bind(updated.away_score)
    .bind(updated.kickoff)
    .bind(updated.updated_at)
    .bind(match_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(stored)
}

async fn load_snapshot(
    tx: &mut Transaction<'_, Postgres>,
    league_id: Uuid,
    season_id: Uuid,
) -> Result<SeasonSnapshot, LeagueError> {
    let points = sqlx::query_as::<_, PointSchedule>(
        r#"
        SELECT l.points_for_win, l.points_for_draw, l.points_for_loss
        FROM leagues l
        JOIN league_seasons s ON s.league_id = l.id
        WHERE l.id = $1 AND s.id = $2
        "#,
    )
    .bind(league_id)
    .bind(season_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(LeagueError::UnknownLeague { league_id, season_id })?;

    let roster: Vec<Uuid> = sqlx::query_scalar(
        "SELECT team_id FROM league_teams WHERE season_id = $1 ORDER BY team_id",
    )
    .bind(season_id)
    .fetch_all(&mut **tx)
    .await?;

    let matches = sqlx::query_as::<_, LeagueMatch>(&format!(
        "SELECT {} FROM league_matches WHERE league_id = $1 AND season_id = $2 ORDER BY kickoff, id",
        MATCH_COLUMNS
    ))
    .bind(league_id)
    .bind(season_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(SeasonSnapshot {
        league_id,
        season_id,
        points,
        roster,
        matches,
    })
}

async fn replace_table(
    tx: &mut Transaction<'_, Postgres>,
    league_id: Uuid,
    season_id: Uuid,
    table: &[TeamSeasonAggregate],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM team_season_aggregates WHERE league_id = $1 AND season_id = $2")
        .bind(league_id)
        .bind(season_id)
        .execute(&mut **tx)
        .await?;
    insert_aggregates(tx, table).await
}

#[async_trait]
impl LeagueStore for PgLeagueStore {
    async fn create_league(&self, league: &League) -> Result<(), LeagueError> {
        sqlx::query(
            r#"
            INSERT INTO leagues (id, name, points_for_win, points_for_draw, points_for_loss, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(league.id)
        .bind(&league.name)
        .bind(league.points.points_for_win)
        .bind(league.points.points_for_draw)
        .bind(league.points.points_for_loss)
        .bind(league.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!("Created league {} ({})", league.name, league.id);
        Ok(())
    }

    async fn league(&self, league_id: Uuid) -> Result<Option<League>, LeagueError> {
        let league = sqlx::query_as::<_, League>(
            r#"
            SELECT id, name, points_for_win, points_for_draw, points_for_loss, created_at
            FROM leagues
            WHERE id = $1
            "#,
        )
        .bind(league_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(league)
    }

    async fn create_season(
        &self,
        season: &LeagueSeason,
        roster: &[Uuid],
        fixtures: &[Fixture],
    ) -> Result<Vec<LeagueMatch>, LeagueError> {
        let mut tx = self.pool.begin().await?;
        lock_season(&mut tx, season.league_id, season.id).await?;

        sqlx::query(
            r#"
            INSERT INTO league_seasons (id, league_id, name, start_date, end_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(season.id)
        .bind(season.league_id)
        .bind(&season.name)
        .bind(season.start_date)
        .bind(season.end_date)
        .bind(season.created_at)
        .execute(&mut *tx)
        .await?;

        if !roster.is_empty() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO league_teams (season_id, team_id) ");
            builder.push_values(roster, |mut b, team_id| {
                b.push_bind(season.id).push_bind(*team_id);
            });
            builder.build().execute(&mut *tx).await?;
        }

        let matches: Vec<LeagueMatch> = fixtures
            .iter()
            .map(|fixture| LeagueMatch::scheduled(season.league_id, season.id, fixture))
            .collect();

        if !matches.is_empty() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO league_matches ({}) ", MATCH_COLUMNS));
            builder.push_values(&matches, |mut b, game| {
                b.push_bind(game.id)
                    .push_bind(game.league_id)
                    .push_bind(game.season_id)
                    .push_bind(game.home_team_id)
                    .push_bind(game.away_team_id)
                    .push_bind(game.kickoff)
                    .push_bind(game.round)
                    .push_bind(game.is_first_leg)
                    .push_bind(game.status)
                    .push_bind(game.home_score)
                    .push_bind(game.away_score)
                    .push_bind(game.updated_at);
            });
            builder.build().execute(&mut *tx).await?;
        }

        let zeroed = TeamSeasonAggregate::opening_table(season.league_id, season.id, roster);
        insert_aggregates(&mut tx, &zeroed).await?;

        tx.commit().await?;

        tracing::info!(
            "Created season '{}' with {} teams and {} matches",
            season.name,
            roster.len(),
            matches.len()
        );

        Ok(matches)
    }

    async fn seasons(&self) -> Result<Vec<(Uuid, Uuid)>, LeagueError> {
        let keys = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT league_id, id FROM league_seasons ORDER BY league_id, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn matches(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<LeagueMatch>, LeagueError> {
        let matches = sqlx::query_as::<_, LeagueMatch>(&format!(
            "SELECT {} FROM league_matches WHERE league_id = $1 AND season_id = $2 ORDER BY kickoff, id",
            MATCH_COLUMNS
        ))
        .bind(league_id)
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(matches)
    }

    async fn update_match_with<F>(&self, match_id: Uuid, update: F) -> Result<LeagueMatch, LeagueError>
    where
        F: FnOnce(LeagueMatch) -> Result<LeagueMatch, LeagueError> + Send + 'static,
    {
        let mut tx = self.pool.begin().await?;
        lock_match_season(&mut tx, match_id).await?;
        let stored = write_match_update(&mut tx, match_id, update).await?;
        tx.commit().await?;

        tracing::info!(
            "Updated match {}: {} ({:?} - {:?})",
            stored.id,
            stored.status,
            stored.home_score,
            stored.away_score
        );

        Ok(stored)
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
        let mut tx = self.pool.begin().await?;
        lock_season(&mut tx, league_id, season_id).await?;

        let snapshot = load_snapshot(&mut tx, league_id, season_id).await?;
        // dropping `tx` on error rolls back and keeps the previous table
        let table = compute(&snapshot)?;
        replace_table(&mut tx, league_id, season_id, &table).await?;

        tx.commit().await?;

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
        let mut tx = self.pool.begin().await?;
        let (league_id, season_id) = lock_match_season(&mut tx, match_id).await?;

        let stored = write_match_update(&mut tx, match_id, update).await?;
        // the snapshot read in the same transaction already holds the new row
        let snapshot = load_snapshot(&mut tx, league_id, season_id).await?;
        let table = compute(&snapshot)?;
        replace_table(&mut tx, league_id, season_id, &table).await?;

        tx.commit().await?;

        tracing::info!(
            "Reported match {}: {} ({:?} - {:?}), table of {} teams rebuilt",
            stored.id,
            stored.status,
            stored.home_score,
            stored.away_score,
            table.len()
        );

        Ok((stored, table))
    }

    async fn standings(&self, league_id: Uuid, season_id: Uuid) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
        let table = sqlx::query_as::<_, TeamSeasonAggregate>(&format!(
            "SELECT {} FROM team_season_aggregates WHERE league_id = $1 AND season_id = $2 ORDER BY position",
            AGGREGATE_COLUMNS
        ))
        .bind(league_id)
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?;

        if table.is_empty() {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM league_seasons WHERE league_id = $1 AND id = $2)",
            )
            .bind(league_id)
            .bind(season_id)
            .fetch_one(&self.pool)
            .await?;
            if !exists {
                return Err(LeagueError::UnknownLeague { league_id, season_id });
            }
        }

        Ok(table)
    }

    async fn delete_league(&self, league_id: Uuid) -> Result<bool, LeagueError> {
        // seasons, matches and table rows cascade
        let result = sqlx::query("DELETE FROM leagues WHERE id = $1")
            .bind(league_id)
            .execute(&self.pool)
            .await?;

        tracing::info!("Deleted league {} ({} rows)", league_id, result.rows_affected());
        Ok(result.rows_affected() > 0)
    }
}
