use std::sync::Arc;
use std::time::Duration;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;

use league_engine::config::settings::get_config;
use league_engine::db::PgLeagueStore;
use league_engine::telemetry::{get_subscriber, init_subscriber};
use league_engine::LeagueService;

/// Consistency repair: rebuild the table of every stored league season.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config()?;

    let subscriber = get_subscriber(
        config.application.name.clone(),
        config.application.log_level.clone(),
        std::io::stdout
    );
    init_subscriber(subscriber);

    let connection_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_lazy(config.database.connection_string().expose_secret())?;

    sqlx::migrate!("./migrations").run(&connection_pool).await?;

    let service = LeagueService::new(
        Arc::new(PgLeagueStore::new(connection_pool)),
        config.engine.clone(),
    );

    let report = service.repair_all().await?;
    for (league_id, season_id, error) in &report.failures {
        tracing::error!(
            "❌ Failed to repair standings for league {} season {}: {}",
            league_id,
            season_id,
            error
        );
    }
    tracing::info!(
        "✅ Repaired {} seasons, {} failed",
        report.repaired,
        report.failures.len()
    );

    if !report.failures.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
