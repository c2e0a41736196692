pub mod config;
pub mod db;
pub mod league;
pub mod models;
pub mod telemetry;

pub use league::{generate_fixtures, recompute_standings, LeagueError, LeagueService};
