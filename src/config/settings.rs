use std::env;
use std::time::Duration;
use config::{Config, File, ConfigError};
use dotenv::dotenv;
use secrecy::{ExposeSecret, SecretString};

use crate::league::standings::DEFAULT_FORM_LENGTH;
use crate::league::validation::DEFAULT_MAX_TEAMS;
use crate::models::league::PointSchedule;

#[derive(serde::Deserialize, Debug)]
pub struct Settings{
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(serde::Deserialize, Debug)]
pub struct DatabaseSettings{
    pub user: String,
    pub password: SecretString,
    pub port: u16,
    pub host: String,
    pub db_name: String,
    #[serde(default)]
    pub db_url: Option<SecretString>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    16
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> SecretString {
        match &self.db_url {
            Some(db_url) => db_url.clone(),
            None => {
                SecretString::new(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    self.user, self.password.expose_secret(), self.host, self.port, self.db_name
                ).into_boxed_str())
            }
        }
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.user, self.password.expose_secret(), self.host, self.port
        )
    }
}

#[derive(serde::Deserialize, Debug)]
pub struct ApplicationSettings{
    pub name: String,
    pub log_level: String
}

/// Knobs for fixture generation and standings recomputation
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Point schedule for leagues created without one
    #[serde(default)]
    pub default_points: PointSchedule,
    #[serde(default = "default_max_teams")]
    pub max_teams: usize,
    /// Wall-clock budget for one recomputation; 0 disables it
    #[serde(default)]
    pub recompute_timeout_ms: u64,
    #[serde(default = "default_form_length")]
    pub form_length: usize,
}

fn default_max_teams() -> usize {
    DEFAULT_MAX_TEAMS
}

fn default_form_length() -> usize {
    DEFAULT_FORM_LENGTH
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_points: PointSchedule::default(),
            max_teams: DEFAULT_MAX_TEAMS,
            recompute_timeout_ms: 0,
            form_length: DEFAULT_FORM_LENGTH,
        }
    }
}

impl EngineSettings {
    pub fn recompute_budget(&self) -> Option<Duration> {
        (self.recompute_timeout_ms > 0).then(|| Duration::from_millis(self.recompute_timeout_ms))
    }
}

pub fn get_config() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Message(format!("Failed to determine the current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    dotenv().ok();

    let environment: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    let env_filename = format!("{}.yml", environment.as_str());
    let config = Config::builder()
        .add_source(File::from(configuration_directory.join("base.yml")))
        .add_source(File::from(configuration_directory.join(env_filename)).required(false))
        .add_source(
            config::Environment::default()
                .prefix("POSTGRES")
                .prefix_separator("__")
                .separator("__")
        )
        .add_source(
            config::Environment::default()
                .prefix("APP")
                .prefix_separator("__")
                .separator("__")
        )
        .build()?;

    let mut settings = config.try_deserialize::<Settings>()?;

    // Hosted environments expose DATABASE_URL directly
    if let Ok(db_url) = env::var("DATABASE_URL") {
        settings.database.db_url = Some(SecretString::new(db_url.into_boxed_str()));
    }

    Ok(settings)
}

#[derive(Debug, PartialEq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. \
                Use either `local` or `production`.",
                other
            )),
        }
    }
}
