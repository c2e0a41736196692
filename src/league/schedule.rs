use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::league::error::LeagueError;
use crate::league::validation::{validate_season_window, validate_team_ids};
use crate::models::league::{Fixture, LeagueMatch, MatchStatus};

/// Generate complete league schedule using the circle method.
/// Each team plays every other team twice (home and away): the first leg
/// fills `[season_start, midpoint)`, the mirrored return leg fills
/// `[midpoint, season_end)`, both in round order.
pub fn generate_fixtures(
    team_ids: &[Uuid],
    season_start: DateTime<Utc>,
    season_end: DateTime<Utc>,
) -> Result<Vec<Fixture>, LeagueError> {
    validate_team_ids(team_ids)?;
    validate_season_window(season_start, season_end)?;

    tracing::info!("Generating round-robin schedule for {} teams", team_ids.len());

    let rounds = first_leg_rounds(team_ids);
    let round_count = rounds.len() as i32;
    let leg_len = rounds.iter().map(Vec::len).sum::<usize>();

    let leg_span = (season_end - season_start) / 2;
    let midpoint = season_start + leg_span;

    let mut fixtures = Vec::with_capacity(leg_len * 2);

    // FIRST LEG
    let mut slot = 0;
    for (round, pairings) in rounds.iter().enumerate() {
        for &(home, away) in pairings {
            let kickoff = slot_time(season_start, leg_span, slot, leg_len);
            tracing::debug!(
                "Creating first leg: Round {} - Team {} (home) vs Team {} (away) at {}",
                round + 1,
                home,
                away,
                kickoff
            );
            fixtures.push(Fixture {
                home_team_id: home,
                away_team_id: away,
                kickoff,
                round: round as i32 + 1,
                is_first_leg: true,
            });
            slot += 1;
        }
    }

    // SECOND LEG: Return fixtures (swap home and away)
    let return_span = season_end - midpoint;
    let mut slot = 0;
    for (round, pairings) in rounds.iter().enumerate() {
        for &(home, away) in pairings {
            let kickoff = slot_time(midpoint, return_span, slot, leg_len);
            tracing::debug!(
                "Creating return fixture: Round {} - Team {} (home) vs Team {} (away) at {}",
                round as i32 + 1 + round_count,
                away,
                home,
                kickoff
            );
            fixtures.push(Fixture {
                home_team_id: away,
                away_team_id: home,
                kickoff,
                round: round as i32 + 1 + round_count,
                is_first_leg: false,
            });
            slot += 1;
        }
    }

    tracing::info!(
        "Schedule generation complete: {} total fixtures over {} rounds",
        fixtures.len(),
        round_count * 2
    );

    Ok(fixtures)
}

/// Single round-robin pairings, one `Vec` per round, as `(home, away)`.
///
/// Slot 0 stays fixed while the other `m = n' - 1` slots rotate. In round
/// `r` the fixed slot meets rotating slot `r`, and rotating slots `r + k`
/// and `r - k` (mod `m`) meet for `k` in `1..n'/2`. Since `m` is odd, every
/// pair of rotating slots sums to exactly one `2r (mod m)`, so each pair
/// is produced once and no slot appears twice in a round.
///
/// The fixed slot is at home in even rounds; in the other pairings slot
/// `r + k` hosts when `k` is odd. No team then plays more than two home or
/// two away games in a row within a leg. An odd roster puts the bye in the
/// fixed slot, so the team drawn against it sits the round out.
fn first_leg_rounds(team_ids: &[Uuid]) -> Vec<Vec<(Uuid, Uuid)>> {
    let mut slots: Vec<Option<Uuid>> = Vec::with_capacity(team_ids.len() + 1);
    if team_ids.len() % 2 == 1 {
        slots.push(None);
    }
    slots.extend(team_ids.iter().copied().map(Some));

    let n = slots.len();
    let m = n - 1;
    let fixed = slots[0];
    let rotating = &slots[1..];

    (0..m)
        .map(|round| {
            let mut pairings = Vec::with_capacity(n / 2);
            push_pairing(&mut pairings, fixed, rotating[round], round % 2 == 0);
            for k in 1..n / 2 {
                let a = rotating[(round + k) % m];
                let b = rotating[(round + m - k) % m];
                push_pairing(&mut pairings, a, b, k % 2 == 1);
            }
            pairings
        })
        .collect()
}

fn push_pairing(
    pairings: &mut Vec<(Uuid, Uuid)>,
    a: Option<Uuid>,
    b: Option<Uuid>,
    a_at_home: bool,
) {
    // byes are discarded
    if let (Some(a), Some(b)) = (a, b) {
        if a_at_home {
            pairings.push((a, b));
        } else {
            pairings.push((b, a));
        }
    }
}

/// Even spread of `total` slots over `[start, start + span)`, at
/// millisecond resolution.
fn slot_time(start: DateTime<Utc>, span: Duration, index: usize, total: usize) -> DateTime<Utc> {
    if total == 0 {
        return start;
    }
    // widened so long windows with large rosters cannot overflow
    let offset = span.num_milliseconds() as i128 * index as i128 / total as i128;
    start + Duration::milliseconds(offset as i64)
}

/// Total rounds over both legs, counting the bye round for odd rosters
pub fn total_rounds(team_count: usize) -> i32 {
    if team_count < 2 {
        return 0;
    }
    let slots = team_count + team_count % 2;
    ((slots - 1) * 2) as i32
}

/// Each team plays every other team twice: n * (n-1) total games
pub fn total_fixtures(team_count: usize) -> i32 {
    if team_count < 2 {
        return 0;
    }
    (team_count * (team_count - 1)) as i32
}

/// Statistics about a league schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStatistics {
    pub total_games: i32,
    pub completed_games: i32,
    pub upcoming_games: i32,
    pub live_games: i32,
    pub postponed_games: i32,
    pub cancelled_games: i32,
    pub first_game_time: Option<DateTime<Utc>>,
    pub last_game_time: Option<DateTime<Utc>>,
    pub progress_percentage: f32,
}

impl ScheduleStatistics {
    pub fn from_matches(matches: &[LeagueMatch]) -> Self {
        let count = |status: MatchStatus| matches.iter().filter(|m| m.status == status).count() as i32;

        let total_games = matches.len() as i32;
        let completed_games = count(MatchStatus::Completed);

        Self {
            total_games,
            completed_games,
            upcoming_games: count(MatchStatus::Scheduled),
            live_games: count(MatchStatus::InProgress),
            postponed_games: count(MatchStatus::Postponed),
            cancelled_games: count(MatchStatus::Cancelled),
            first_game_time: matches.iter().map(|m| m.kickoff).min(),
            last_game_time: matches.iter().map(|m| m.kickoff).max(),
            progress_percentage: if total_games > 0 {
                (completed_games as f32 / total_games as f32) * 100.0
            } else {
                0.0
            },
        }
    }
}
