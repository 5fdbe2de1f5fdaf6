use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use courtier_core::repositories::SalesAdminsRepository;
use courtier_core::sales::beginning_of_month;
use courtier_core::CalculateMonthlyPerformanceMatrix;
use courtier_db::DemoDataset;

use super::CommandResult;

pub async fn run(month: Option<&str>) -> CommandResult {
    match compute(month).await {
        Ok(details) => CommandResult::success_with(
            "matrix",
            "monthly performance matrices computed on the demo dataset",
            Some(details),
        ),
        Err(error) => CommandResult::failure("matrix", "matrix_failed", format!("{error:#}"), 1),
    }
}

fn parse_month(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
            .map_err(|_| anyhow!("`{raw}` is not a YYYY-MM month")),
        None => Ok(beginning_of_month(chrono::Utc::now().date_naive())),
    }
}

async fn compute(month: Option<&str>) -> Result<serde_json::Value> {
    let month = beginning_of_month(parse_month(month)?);
    let dataset = DemoDataset::seed(month).await;

    let consultants = dataset
        .admins
        .active_sales_consultant_ids()
        .await
        .context("loading demo consultants")?;

    let matrices = CalculateMonthlyPerformanceMatrix::new(dataset.closings.clone())
        .call(month, &consultants, &[])
        .await
        .context("computing monthly matrices")?;

    let mut summaries = Vec::new();
    for consultant_id in consultants {
        let Some(matrix) = matrices.get(&consultant_id) else { continue };

        let cells: Vec<serde_json::Value> = matrix
            .iter()
            .filter_map(|(open_leads, revenue, rate)| {
                rate.map(|rate| {
                    serde_json::json!({
                        "open_leads_bucket": open_leads,
                        "revenue_bucket": revenue,
                        "conversion_rate": rate,
                    })
                })
            })
            .collect();

        summaries.push(serde_json::json!({
            "consultant_id": consultant_id.0,
            "populated_cells": cells.len(),
            "cells": cells,
        }));
    }

    Ok(serde_json::json!({ "month": month.to_string(), "consultants": summaries }))
}
