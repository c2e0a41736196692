use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::league::MatchStatus;

#[derive(Debug, thiserror::Error)]
pub enum LeagueError {
    #[error("Minimum 2 teams required, got {count}")]
    InsufficientTeams { count: usize },

    #[error("Maximum {max} teams allowed, got {count}")]
    TooManyTeams { count: usize, max: usize },

    #[error("Duplicate team ID found: {0}")]
    DuplicateTeam(Uuid),

    #[error("Invalid season name: {0}")]
    InvalidName(String),

    #[error("Invalid season window: start {start} must be before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Negative score {home_score}-{away_score} reported for match {match_id}")]
    NegativeScore {
        match_id: Uuid,
        home_score: i32,
        away_score: i32,
    },

    #[error("Match {match_id} cannot move from {from} to {to}")]
    InvalidTransition {
        match_id: Uuid,
        from: MatchStatus,
        to: MatchStatus,
    },

    #[error("No roster or matches found for league {league_id}, season {season_id}")]
    UnknownLeague { league_id: Uuid, season_id: Uuid },

    #[error("League not found: {0}")]
    LeagueNotFound(Uuid),

    #[error("Match not found: {0}")]
    MatchNotFound(Uuid),

    #[error("Match {match_id} references team {team_id} which is not on the season roster")]
    UnknownTeam { match_id: Uuid, team_id: Uuid },

    #[error("Match {match_id} is completed but has no final score")]
    MissingScore { match_id: Uuid },

    #[error("Match {match_id} pairs team {team_id} with itself")]
    SelfPairing { match_id: Uuid, team_id: Uuid },

    #[error("Match {match_id} belongs to a different league or season")]
    ForeignMatch { match_id: Uuid },

    #[error("Totals of team {team_id} overflow when folding match {match_id}")]
    TallyOverflow { match_id: Uuid, team_id: Uuid },

    #[error("Standings recomputation exceeded its budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Coarse classification for callers that render errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    NotFound,
    Consistency,
    Timeout,
    Storage,
}

impl LeagueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeagueError::InsufficientTeams { .. }
            | LeagueError::TooManyTeams { .. }
            | LeagueError::DuplicateTeam(_)
            | LeagueError::InvalidName(_)
            | LeagueError::InvalidWindow { .. }
            | LeagueError::NegativeScore { .. }
            | LeagueError::InvalidTransition { .. } => ErrorKind::InputValidation,
            LeagueError::UnknownLeague { .. }
            | LeagueError::LeagueNotFound(_)
            | LeagueError::MatchNotFound(_) => ErrorKind::NotFound,
            LeagueError::UnknownTeam { .. }
            | LeagueError::MissingScore { .. }
            | LeagueError::SelfPairing { .. }
            | LeagueError::ForeignMatch { .. }
            | LeagueError::TallyOverflow { .. } => ErrorKind::Consistency,
            LeagueError::Timeout { .. } => ErrorKind::Timeout,
            LeagueError::Database(_) => ErrorKind::Storage,
        }
    }

    /// Serialization failures and deadlocks can be retried by the caller
    /// with a fresh transaction. The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            LeagueError::Database(sqlx::Error::Database(db_err)) => {
                matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}
