use anyhow::{Context, Result};

use courtier_core::config::{AppConfig, LoadOptions};
use courtier_db::{connect, fixtures, migrations};

use super::CommandResult;

pub async fn run() -> CommandResult {
    match seed().await {
        Ok(details) => CommandResult::success_with(
            "seed",
            "migrations applied and demo fixtures loaded",
            Some(details),
        ),
        Err(error) => CommandResult::failure("seed", "seed_failed", format!("{error:#}"), 1),
    }
}

async fn seed() -> Result<serde_json::Value> {
    let config = AppConfig::load(LoadOptions::default()).context("loading configuration")?;

    let pool = connect(&config.database).await.context("connecting to the database")?;

    migrations::run_pending(&pool).await.context("applying migrations")?;
    let inserted = fixtures::seed_database(&pool).await.context("seeding fixtures")?;

    Ok(serde_json::json!({
        "database_url": config.database.url,
        "rows_inserted": inserted,
    }))
}
