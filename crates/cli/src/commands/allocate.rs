use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Months;

use courtier_aoa::{AoaClient, BuildAoaData};
use courtier_core::config::{AppConfig, LoadOptions};
use courtier_core::sales::beginning_of_month;
use courtier_core::{
    CalculateMonthlyPerformanceMatrix, CalculateOpenLeadsCount, CalculatePerformanceMatrix,
    CalculateRevenue, GenerateHistoricalMonthlyAdminPerformance, MandateId, Opportunity,
    OpportunityId, OpportunityState, PerformanceSettings, PopulateMonthlyAdminPerformance,
};
use courtier_db::DemoDataset;

use super::CommandResult;

pub async fn run(opportunity_id: i64) -> CommandResult {
    match allocate(opportunity_id).await {
        Ok(details) => CommandResult::success_with(
            "allocate",
            "consultant allocation computed on the demo dataset",
            Some(details),
        ),
        Err(error) => {
            CommandResult::failure("allocate", "allocate_failed", format!("{error:#}"), 1)
        }
    }
}

/// Backfills the demo dataset so ranking has matrices to send, then
/// runs the allocation for a synthetic unassigned BU opportunity. With
/// no ranking service reachable the result degrades to the control
/// group, which is the interesting path to demonstrate.
async fn allocate(opportunity_id: i64) -> Result<serde_json::Value> {
    let config = AppConfig::load(LoadOptions::default()).context("loading configuration")?;
    let settings = PerformanceSettings::from(&config.aoa);

    let today = chrono::Utc::now().date_naive();
    let current_month = beginning_of_month(today);
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
    .context("preparing performance matrices")?;

    let opportunity = Opportunity {
        id: OpportunityId(opportunity_id),
        mandate_id: MandateId(1),
        category_ident: config.aoa.bu_category_ident.clone(),
        state: OpportunityState::Created,
        consultant_id: None,
    };

    let interactor = BuildAoaData::new(
        Arc::new(AoaClient::new(&config.aoa)),
        dataset.admins.clone(),
        dataset.performances.clone(),
        config.aoa,
    );
    let data = interactor.call(&opportunity).await.context("building allocation data")?;

    Ok(serde_json::json!({
        "opportunity_id": opportunity_id,
        "cohort": data.response.cohort.as_str(),
        "admins_for_select": data.admins_for_select.iter().map(|id| id.0).collect::<Vec<_>>(),
        "aoa_consultant_ids": data.response.aoa_consultant_ids.iter().map(|id| id.0).collect::<Vec<_>>(),
        "aoa_errors": data.response.aoa_errors,
        "request_uuid": data.response.request_uuid,
    }))
}
