use std::collections::HashSet;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::league::error::LeagueError;
use crate::models::league::{CreateSeasonRequest, LeagueMatch, ResultReport};

/// Default cap on roster size
pub const DEFAULT_MAX_TEAMS: usize = 20;

/// Centralized validation service for league operations
#[derive(Debug, Clone)]
pub struct LeagueValidator {
    max_teams: usize,
}

impl Default for LeagueValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl LeagueValidator {
    pub fn new() -> Self {
        Self { max_teams: DEFAULT_MAX_TEAMS }
    }

    pub fn with_max_teams(max_teams: usize) -> Self {
        Self { max_teams }
    }

    /// Validate season creation request
    pub fn validate_create_season_request(&self, request: &CreateSeasonRequest) -> Result<(), LeagueError> {
        validate_season_name(&request.name)?;
        self.validate_team_count(request.team_ids.len())?;
        validate_team_ids(&request.team_ids)?;
        validate_season_window(request.start_date, request.end_date)?;
        Ok(())
    }

    pub fn validate_team_count(&self, count: usize) -> Result<(), LeagueError> {
        if count > self.max_teams {
            return Err(LeagueError::TooManyTeams { count, max: self.max_teams });
        }
        Ok(())
    }

    /// Validate a result report against the current state of the match
    pub fn validate_result_report(&self, game: &LeagueMatch, report: &ResultReport) -> Result<(), LeagueError> {
        if let ResultReport::Final { home_score, away_score } = *report {
            validate_scores(game.id, home_score, away_score)?;
        }

        if game.status.is_terminal() {
            return Err(LeagueError::InvalidTransition {
                match_id: game.id,
                from: game.status,
                to: report.target_status(),
            });
        }

        Ok(())
    }
}

/// Validate season name
pub fn validate_season_name(name: &str) -> Result<(), LeagueError> {
    let trimmed_name = name.trim();

    if trimmed_name.is_empty() {
        return Err(LeagueError::InvalidName("Season name cannot be empty".into()));
    }

    if trimmed_name.len() > 255 {
        return Err(LeagueError::InvalidName("Season name too long (maximum 255 characters)".into()));
    }

    if !trimmed_name.chars().any(|c| c.is_alphanumeric()) {
        return Err(LeagueError::InvalidName(format!(
            "Season name must contain alphanumeric characters, got {:?}",
            trimmed_name
        )));
    }

    Ok(())
}

/// At least two teams, none repeated.
pub fn validate_team_ids(team_ids: &[Uuid]) -> Result<(), LeagueError> {
    if team_ids.len() < 2 {
        return Err(LeagueError::InsufficientTeams { count: team_ids.len() });
    }

    let mut unique_teams = HashSet::with_capacity(team_ids.len());
    for team_id in team_ids {
        if !unique_teams.insert(team_id) {
            return Err(LeagueError::DuplicateTeam(*team_id));
        }
    }

    Ok(())
}

pub fn validate_season_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), LeagueError> {
    if start >= end {
        return Err(LeagueError::InvalidWindow { start, end });
    }
    Ok(())
}

pub fn validate_scores(match_id: Uuid, home_score: i32, away_score: i32) -> Result<(), LeagueError> {
    if home_score < 0 || away_score < 0 {
        return Err(LeagueError::NegativeScore { match_id, home_score, away_score });
    }
    Ok(())
}
