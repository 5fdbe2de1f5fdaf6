use anyhow::{Context, Result};
use chrono::Months;

use courtier_core::config::{AppConfig, LoadOptions};
use courtier_core::sales::beginning_of_month;
use courtier_core::{
    CalculateMonthlyPerformanceMatrix, CalculateOpenLeadsCount, CalculatePerformanceMatrix,
    CalculateRevenue, GenerateHistoricalMonthlyAdminPerformance, PerformanceSettings,
    PopulateMonthlyAdminPerformance,
};
use courtier_db::DemoDataset;

use super::CommandResult;

pub async fn run() -> CommandResult {
    match backfill().await {
        Ok(details) => CommandResult::success_with(
            "backfill",
            "historical monthly performance generated on the demo dataset",
            Some(details),
        ),
        Err(error) => {
            CommandResult::failure("backfill", "backfill_failed", format!("{error:#}"), 1)
        }
    }
}

async fn backfill() -> Result<serde_json::Value> {
    let config = AppConfig::load(LoadOptions::default()).context("loading configuration")?;
    let settings = PerformanceSettings::from(&config.aoa);

    let today = chrono::Utc::now().date_naive();
    let current_month = beginning_of_month(today);
    // The demo dataset carries three months of closings; start the
    // backfill where its history begins.
    let epoch = current_month.checked_sub_months(Months::new(2)).unwrap_or(current_month);

    let dataset = DemoDataset::seed(current_month).await;

    let populate = PopulateMonthlyAdminPerformance::new(
        dataset.admins.clone(),
        dataset.performances.clone(),
        dataset.classifications.clone(),
        CalculateRevenue::new(dataset.admins.clone(), dataset.closings.clone()),
        CalculateOpenLeadsCount::new(dataset.admins.clone(), dataset.open_counts.clone()),
        CalculatePerformanceMatrix::new(CalculateMonthlyPerformanceMatrix::new(
            dataset.closings.clone(),
        )),
        CalculateMonthlyPerformanceMatrix::new(dataset.closings.clone()),
        settings.clone(),
    );

    GenerateHistoricalMonthlyAdminPerformance::new(
        populate,
        dataset.admins.clone(),
        dataset.performances.clone(),
        dataset.aoa_categories.clone(),
        settings,
        epoch,
    )
    .call(today)
    .await
    .context("running the historical backfill")?;

    let rows = dataset.performances.rows().await;
    let snapshots: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "consultant_id": row.consultant_id.0,
                "month": row.calculation_date.to_string(),
                "revenue": row.revenue.to_string(),
                "open_opportunities": row.open_opportunities,
                "months_count": row.months_count,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "from": epoch.to_string(),
        "through": current_month.to_string(),
        "rows_written": rows.len(),
        "snapshots": snapshots,
    }))
}
