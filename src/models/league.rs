// src/models/league.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use std::fmt;

/// Points awarded per result. Configured once per league.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PointSchedule {
    pub points_for_win: i32,
    pub points_for_draw: i32,
    pub points_for_loss: i32,
}

impl Default for PointSchedule {
    fn default() -> Self {
        Self {
            points_for_win: 3,
            points_for_draw: 1,
            points_for_loss: 0,
        }
    }
}

impl PointSchedule {
    pub fn points_for(&self, result: MatchResult) -> i32 {
        match result {
            MatchResult::Win => self.points_for_win,
            MatchResult::Draw => self.points_for_draw,
            MatchResult::Loss => self.points_for_loss,
        }
    }
}

#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct League {
    pub id: Uuid,
    pub name: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub points: PointSchedule,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LeagueSeason {
    pub id: Uuid,
    pub league_id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A generated pairing, not yet persisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub kickoff: DateTime<Utc>,
    /// 1-based, counted across both legs
    pub round: i32,
    pub is_first_leg: bool,
}

#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LeagueMatch {
    pub id: Uuid,
    pub league_id: Uuid,
    pub season_id: Uuid,
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub kickoff: DateTime<Utc>,
    pub round: i32,
    pub is_first_leg: bool,
    pub status: MatchStatus,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl LeagueMatch {
    /// Build the persisted form of a generated fixture.
    pub fn scheduled(league_id: Uuid, season_id: Uuid, fixture: &Fixture) -> Self {
        Self {
            id: Uuid::new_v4(),
            league_id,
            season_id,
            home_team_id: fixture.home_team_id,
            away_team_id: fixture.away_team_id,
            kickoff: fixture.kickoff,
            round: fixture.round,
            is_first_leg: fixture.is_first_leg,
            status: MatchStatus::Scheduled,
            home_score: None,
            away_score: None,
            updated_at: Utc::now(),
        }
    }

    /// Only completed matches count towards the table.
    pub fn is_decided(&self) -> bool {
        self.status == MatchStatus::Completed
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Completed,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled matches never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a match from one team's point of view
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Win,
    Draw,
    Loss,
}

impl MatchResult {
    pub fn from_scores(goals_for: i32, goals_against: i32) -> Self {
        match goals_for.cmp(&goals_against) {
            std::cmp::Ordering::Greater => MatchResult::Win,
            std::cmp::Ordering::Equal => MatchResult::Draw,
            std::cmp::Ordering::Less => MatchResult::Loss,
        }
    }

    /// Get the inverse result (from opponent's perspective)
    pub fn inverse(&self) -> Self {
        match self {
            MatchResult::Win => MatchResult::Loss,
            MatchResult::Loss => MatchResult::Win,
            MatchResult::Draw => MatchResult::Draw,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            MatchResult::Win => 'W',
            MatchResult::Draw => 'D',
            MatchResult::Loss => 'L',
        }
    }
}

/// One row of the league table for a (team, league, season).
///
/// Always rebuilt from the completed matches; never patched in place.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TeamSeasonAggregate {
    pub team_id: Uuid,
    pub league_id: Uuid,
    pub season_id: Uuid,
    pub matches_played: i32,
    pub won: i32,
    pub drawn: i32,
    pub lost: i32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub goal_difference: i32,
    pub points: i32,
    pub clean_sheets: i32,
    pub form_points: i32,
    /// Most recent result last
    pub form_string: String,
    pub position: i32,
}

impl TeamSeasonAggregate {
    pub fn zeroed(league_id: Uuid, season_id: Uuid, team_id: Uuid, position: i32) -> Self {
        Self {
            team_id,
            league_id,
            season_id,
            matches_played: 0,
            won: 0,
            drawn: 0,
            lost: 0,
            goals_for: 0,
            goals_against: 0,
            goal_difference: 0,
            points: 0,
            clean_sheets: 0,
            form_points: 0,
            form_string: String::new(),
            position,
        }
    }

    /// Table of a season before any match is played. Everyone is level,
    /// so the team id decides the order.
    pub fn opening_table(league_id: Uuid, season_id: Uuid, roster: &[Uuid]) -> Vec<Self> {
        let mut team_ids = roster.to_vec();
        team_ids.sort();
        team_ids
            .into_iter()
            .enumerate()
            .map(|(index, team_id)| Self::zeroed(league_id, season_id, team_id, index as i32 + 1))
            .collect()
    }
}

/// Everything a recomputation reads, taken from one consistent read.
#[derive(Debug, Clone)]
pub struct SeasonSnapshot {
    pub league_id: Uuid,
    pub season_id: Uuid,
    pub points: PointSchedule,
    /// Teams registered for the season; may be empty for legacy seasons
    pub roster: Vec<Uuid>,
    pub matches: Vec<LeagueMatch>,
}

// Request/Response DTOs
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResultReport {
    Final { home_score: i32, away_score: i32 },
    Postponed,
    Cancelled,
}

impl ResultReport {
    pub fn target_status(&self) -> MatchStatus {
        match self {
            ResultReport::Final { .. } => MatchStatus::Completed,
            ResultReport::Postponed => MatchStatus::Postponed,
            ResultReport::Cancelled => MatchStatus::Cancelled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateSeasonRequest {
    pub league_id: Uuid,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub team_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeasonSchedule {
    pub season: LeagueSeason,
    pub matches: Vec<LeagueMatch>,
    pub total_rounds: i32,
}

impl fmt::Display for CreateSeasonRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "league_id: {}, name: {}, teams: {}, window: {} .. {}",
            self.league_id,
            self.name,
            self.team_ids.len(),
            self.start_date,
            self.end_date
        )
    }
}
