use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;
use crate::league::error::LeagueError;
use crate::league::validation::validate_scores;
use crate::models::league::*;

/// Number of most recent results kept in the form guide
pub const DEFAULT_FORM_LENGTH: usize = 5;

/// Rebuild the whole table for one league season from its match set,
/// using the snapshot's point schedule and a five-match form guide.
pub fn recompute_standings(snapshot: &SeasonSnapshot) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
    StandingsCalculator::new(snapshot.points).recompute(snapshot)
}

/// Pure standings computation. Never reads stored aggregates, so running it
/// again over the same matches always yields the same table.
#[derive(Debug, Clone)]
pub struct StandingsCalculator {
    points: PointSchedule,
    form_length: usize,
}

#[derive(Debug)]
struct Tally {
    row: TeamSeasonAggregate,
    /// `(match_id, result)` in kickoff order
    results: Vec<(Uuid, MatchResult)>,
}

impl StandingsCalculator {
    pub fn new(points: PointSchedule) -> Self {
        Self {
            points,
            form_length: DEFAULT_FORM_LENGTH,
        }
    }

    pub fn with_form_length(mut self, form_length: usize) -> Self {
        self.form_length = form_length;
        self
    }

    pub fn recompute(&self, snapshot: &SeasonSnapshot) -> Result<Vec<TeamSeasonAggregate>, LeagueError> {
        let teams = self.resolve_teams(snapshot)?;

        let mut tallies: BTreeMap<Uuid, Tally> = teams
            .into_iter()
            .map(|team_id| {
                let row = TeamSeasonAggregate::zeroed(snapshot.league_id, snapshot.season_id, team_id, 0);
                (team_id, Tally { row, results: Vec::new() })
            })
            .collect();

        // Fold in kickoff order; the id only breaks ties between simultaneous kickoffs
        let mut completed: Vec<&LeagueMatch> = snapshot.matches.iter().filter(|m| m.is_decided()).collect();
        completed.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then_with(|| a.id.cmp(&b.id)));

        for game in completed {
            let (home_score, away_score) = match (game.home_score, game.away_score) {
                (Some(home), Some(away)) => (home, away),
                _ => return Err(LeagueError::MissingScore { match_id: game.id }),
            };
            validate_scores(game.id, home_score, away_score)?;

            let home_result = MatchResult::from_scores(home_score, away_score);
            tracing::debug!(
                "Folding match {}: {} {} - {} {} ({:?})",
                game.id,
                game.home_team_id,
                home_score,
                away_score,
                game.away_team_id,
                home_result
            );

            self.apply(&mut tallies, game, game.home_team_id, home_score, away_score, home_result)?;
            self.apply(&mut tallies, game, game.away_team_id, away_score, home_score, home_result.inverse())?;
        }

        let mut table: Vec<TeamSeasonAggregate> = tallies
            .into_values()
            .map(|tally| self.finish(tally))
            .collect::<Result<_, _>>()?;

        table.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| b.goal_difference.cmp(&a.goal_difference))
                .then_with(|| b.goals_for.cmp(&a.goals_for))
                .then_with(|| a.team_id.cmp(&b.team_id))
        });

        for (index, row) in table.iter_mut().enumerate() {
            row.position = index as i32 + 1;
        }

        Ok(table)
    }

    /// Roster teams when a roster exists, otherwise every team that
    /// appears in a fixture. Every match must fit the season.
    fn resolve_teams(&self, snapshot: &SeasonSnapshot) -> Result<HashSet<Uuid>, LeagueError> {
        let roster: HashSet<Uuid> = snapshot.roster.iter().copied().collect();
        let mut teams = roster.clone();

        for game in &snapshot.matches {
            if game.league_id != snapshot.league_id || game.season_id != snapshot.season_id {
                return Err(LeagueError::ForeignMatch { match_id: game.id });
            }
            if game.home_team_id == game.away_team_id {
                return Err(LeagueError::SelfPairing {
                    match_id: game.id,
                    team_id: game.home_team_id,
                });
            }
            for team_id in [game.home_team_id, game.away_team_id] {
                if roster.is_empty() {
                    teams.insert(team_id);
                } else if !roster.contains(&team_id) {
                    return Err(LeagueError::UnknownTeam { match_id: game.id, team_id });
                }
            }
        }

        if teams.is_empty() {
            return Err(LeagueError::UnknownLeague {
                league_id: snapshot.league_id,
                season_id: snapshot.season_id,
            });
        }

        Ok(teams)
    }

    fn apply(
        &self,
        tallies: &mut BTreeMap<Uuid, Tally>,
        game: &LeagueMatch,
        team_id: Uuid,
        goals_for: i32,
        goals_against: i32,
        result: MatchResult,
    ) -> Result<(), LeagueError> {
        // resolve_teams guarantees every match team has a tally
        let Some(tally) = tallies.get_mut(&team_id) else {
            return Ok(());
        };
        let overflow = || LeagueError::TallyOverflow { match_id: game.id, team_id };
        let row = &mut tally.row;

        row.goals_for = row.goals_for.checked_add(goals_for).ok_or_else(overflow)?;
        row.goals_against = row.goals_against.checked_add(goals_against).ok_or_else(overflow)?;
        row.points = row.points.checked_add(self.points.points_for(result)).ok_or_else(overflow)?;
        row.matches_played += 1;
        match result {
            MatchResult::Win => row.won += 1,
            MatchResult::Draw => row.drawn += 1,
            MatchResult::Loss => row.lost += 1,
        }
        if goals_against == 0 {
            row.clean_sheets += 1;
        }
        tally.results.push((game.id, result));
        Ok(())
    }

    fn finish(&self, tally: Tally) -> Result<TeamSeasonAggregate, LeagueError> {
        let Tally { mut row, results } = tally;

        // both totals are non-negative, so the difference always fits
        row.goal_difference = row.goals_for - row.goals_against;

        let recent = &results[results.len().saturating_sub(self.form_length)..];
        row.form_string = recent.iter().map(|(_, r)| r.as_char()).collect();
        row.form_points = 0;
        for &(match_id, result) in recent {
            row.form_points = row
                .form_points
                .checked_add(self.points.points_for(result))
                .ok_or(LeagueError::TallyOverflow { match_id, team_id: row.team_id })?;
        }

        Ok(row)
    }
}
