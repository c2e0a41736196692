pub mod error;
pub mod league;
pub mod schedule;
pub mod standings;
pub mod validation;

pub use error::{ErrorKind, LeagueError};
pub use league::{LeagueService, RepairReport};
pub use schedule::{generate_fixtures, ScheduleStatistics};
pub use standings::{recompute_standings, StandingsCalculator};
