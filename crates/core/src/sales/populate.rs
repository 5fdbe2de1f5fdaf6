//! Upserts the per-consultant monthly performance snapshot: month
//! inputs, rolling matrix update with the forget window, and the
//! classification lookup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::AoaConfig;
use crate::domain::performance::MonthlyAdminPerformance;
use crate::domain::portfolio::ConsultantId;
use crate::errors::ApplicationError;
use crate::repositories::{
    AdminPerformanceClassificationsRepository, MonthlyAdminPerformancesRepository,
    SalesAdminsRepository,
};

use super::gather::{filter_permitted, CalculateOpenLeadsCount, CalculateRevenue};
use super::matrix::{CalculateMonthlyPerformanceMatrix, CalculatePerformanceMatrix, RollingInput};
use super::{beginning_of_month, months_back};

/// The settings the snapshot computation needs, lifted out of the AOA
/// config section.
#[derive(Clone, Debug)]
pub struct PerformanceSettings {
    pub algo_version: String,
    pub remember_window_size: u32,
}

impl From<&AoaConfig> for PerformanceSettings {
    fn from(config: &AoaConfig) -> Self {
        Self {
            algo_version: config.algo_version.clone(),
            remember_window_size: config.remember_window_size,
        }
    }
}

pub struct PopulateMonthlyAdminPerformance {
    admins: Arc<dyn SalesAdminsRepository>,
    performances: Arc<dyn MonthlyAdminPerformancesRepository>,
    classifications: Arc<dyn AdminPerformanceClassificationsRepository>,
    revenue: CalculateRevenue,
    open_leads: CalculateOpenLeadsCount,
    matrices: CalculatePerformanceMatrix,
    forget_months: CalculateMonthlyPerformanceMatrix,
    settings: PerformanceSettings,
}

impl PopulateMonthlyAdminPerformance {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admins: Arc<dyn SalesAdminsRepository>,
        performances: Arc<dyn MonthlyAdminPerformancesRepository>,
        classifications: Arc<dyn AdminPerformanceClassificationsRepository>,
        revenue: CalculateRevenue,
        open_leads: CalculateOpenLeadsCount,
        matrices: CalculatePerformanceMatrix,
        forget_months: CalculateMonthlyPerformanceMatrix,
        settings: PerformanceSettings,
    ) -> Self {
        Self {
            admins,
            performances,
            classifications,
            revenue,
            open_leads,
            matrices,
            forget_months,
            settings,
        }
    }

    /// Computes and persists the snapshot for `date`'s month. A fresh
    /// month (or a consultant without a row yet) inserts; re-running
    /// mid-month updates the existing row in place.
    pub async fn call(
        &self,
        date: NaiveDate,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> Result<Vec<MonthlyAdminPerformance>, ApplicationError> {
        let month = beginning_of_month(date);
        let permitted = filter_permitted(self.admins.as_ref(), consultant_ids).await?;
        if permitted.is_empty() {
            return Ok(Vec::new());
        }

        let revenue = self.revenue.call(month, &permitted, category_idents).await?;
        let leads = self.open_leads.call(&permitted, category_idents).await?;
        let last_records =
            self.performances.latest_before(&self.settings.algo_version, month, &permitted).await?;

        let rolling_inputs =
            self.rolling_inputs(month, category_idents, &last_records).await?;
        let matrices =
            self.matrices.call(month, &permitted, category_idents, &rolling_inputs).await?;

        let existing =
            self.performances.find_for_month(&self.settings.algo_version, month, &permitted).await?;
        let classifications =
            self.classifications.performance_classifications(&permitted).await?;

        let mut saved = Vec::with_capacity(permitted.len());
        for consultant_id in permitted {
            let lead = leads.get(&consultant_id).cloned().unwrap_or_default();
            let months_count =
                rolling_inputs.get(&consultant_id).map(|input| input.count).unwrap_or(1);

            let record = MonthlyAdminPerformance {
                id: None,
                consultant_id,
                calculation_date: month,
                revenue: revenue.get(&consultant_id).copied().unwrap_or(Decimal::ZERO),
                open_opportunities: lead.open_opportunities,
                open_opportunities_category_counts: lead.open_opportunities_category_counts,
                performance_level: classifications
                    .get(&consultant_id)
                    .cloned()
                    .unwrap_or_default(),
                performance_matrix: matrices
                    .get(&consultant_id)
                    .cloned()
                    .unwrap_or_default(),
                months_count,
                algo_version: self.settings.algo_version.clone(),
            };

            // A run on the month's first day starts the month fresh;
            // afterwards the month's row accumulates in place.
            let existing_id = if date == month {
                None
            } else {
                existing.get(&consultant_id).and_then(|record| record.id)
            };

            debug!(
                consultant_id = consultant_id.0,
                month = %month,
                update = existing_id.is_some(),
                "saving monthly performance snapshot"
            );
            saved.push(self.performances.save(record, existing_id).await?);
        }

        Ok(saved)
    }

    /// Rolling-average inputs per consultant with a prior record. The
    /// forget month is only computed for consultants whose window is
    /// already full, and only with one repository round-trip.
    async fn rolling_inputs(
        &self,
        month: NaiveDate,
        category_idents: &[String],
        last_records: &HashMap<ConsultantId, MonthlyAdminPerformance>,
    ) -> Result<HashMap<ConsultantId, RollingInput>, ApplicationError> {
        let window = self.settings.remember_window_size;

        let forgetting: Vec<ConsultantId> = last_records
            .iter()
            .filter(|(_, record)| record.months_count >= window)
            .map(|(consultant_id, _)| *consultant_id)
            .collect();

        let mut forgotten = if forgetting.is_empty() {
            HashMap::new()
        } else {
            let forget_month = months_back(month, window);
            self.forget_months.call(forget_month, &forgetting, category_idents).await?
        };

        let mut inputs = HashMap::with_capacity(last_records.len());
        for (consultant_id, record) in last_records {
            inputs.insert(
                *consultant_id,
                RollingInput {
                    last: record.performance_matrix.clone(),
                    count: (record.months_count + 1).min(window),
                    forgotten: forgotten.remove(consultant_id),
                },
            );
        }

        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::performance::{MatrixShape, PerformanceMatrix};
    use crate::domain::portfolio::ConsultantId;

    use crate::sales::testkit::{closing, Fixture};

    fn may() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn first_computation_inserts_a_fresh_row() {
        let fixture = Fixture::new(&[ConsultantId(1)]);
        fixture.add_closings(ConsultantId(1), vec![closing(true, 12.0, 10_000)]).await;

        let saved = fixture
            .populate()
            .call(may(), &[ConsultantId(1)], &[])
            .await
            .expect("populate succeeds");

        assert_eq!(saved.len(), 1);
        let record = &saved[0];
        assert_eq!(record.calculation_date, may());
        assert_eq!(record.months_count, 1);
        assert_eq!(record.performance_matrix.get(20, 15_000), Some(1.0));
        assert!(record.id.is_some(), "persisted row carries its id");
    }

    #[tokio::test]
    async fn mid_month_rerun_updates_the_existing_row_in_place() {
        let fixture = Fixture::new(&[ConsultantId(1)]);
        fixture.add_closings(ConsultantId(1), vec![closing(true, 12.0, 10_000)]).await;

        let first = fixture
            .populate()
            .call(may(), &[ConsultantId(1)], &[])
            .await
            .expect("first run");
        let first_id = first[0].id;

        let mid_month = NaiveDate::from_ymd_opt(2025, 5, 14).unwrap();
        let second = fixture
            .populate()
            .call(mid_month, &[ConsultantId(1)], &[])
            .await
            .expect("second run");

        assert_eq!(second[0].id, first_id, "same row updated");
        assert_eq!(fixture.performance_row_count().await, 1);
    }

    #[tokio::test]
    async fn prior_month_average_is_rolled_forward() {
        let fixture = Fixture::new(&[ConsultantId(1)]);

        let shape = MatrixShape::default();
        let mut last = PerformanceMatrix::empty(&shape);
        last.set(20, 15_000, Some(0.4));
        fixture
            .seed_performance(ConsultantId(1), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), last, 2)
            .await;

        fixture.add_closings(ConsultantId(1), vec![closing(true, 12.0, 10_000)]).await;

        let saved = fixture
            .populate()
            .call(may(), &[ConsultantId(1)], &[])
            .await
            .expect("populate succeeds");

        // count advances to 3: 0.4 + (1.0 - 0.4) / 3 = 0.6
        let cell = saved[0].performance_matrix.get(20, 15_000).expect("rolled cell");
        assert!((cell - 0.6).abs() < 1e-12);
        assert_eq!(saved[0].months_count, 3);
    }

    #[tokio::test]
    async fn full_window_subtracts_the_forgotten_month() {
        let fixture = Fixture::new(&[ConsultantId(1)]).with_window(2);

        // Prior average at a full window of 2 months: cell (10, 3000)
        // sits at 0.5.
        let shape = MatrixShape::default();
        let mut last = PerformanceMatrix::empty(&shape);
        last.set(10, 3_000, Some(0.5));
        fixture
            .seed_performance(ConsultantId(1), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), last, 2)
            .await;

        // March (the month leaving the window) converted fully in that
        // cell; May's fresh sample converts not at all.
        fixture
            .add_closings_for_month(
                ConsultantId(1),
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                vec![closing(true, 5.0, 2_000)],
            )
            .await;
        fixture.add_closings(ConsultantId(1), vec![closing(false, 5.0, 2_000)]).await;

        let saved = fixture
            .populate()
            .call(may(), &[ConsultantId(1)], &[])
            .await
            .expect("populate succeeds");

        // 0.5 + (0.0 - 1.0) / 2 = 0.0, clamped into the unit interval.
        let cell = saved[0].performance_matrix.get(10, 3_000).expect("rolled cell");
        assert!(cell.abs() < 1e-12);
        assert_eq!(saved[0].months_count, 2, "window stays capped");
    }

    #[tokio::test]
    async fn revenue_and_open_leads_land_on_the_snapshot() {
        let fixture = Fixture::new(&[ConsultantId(1)]);
        fixture
            .add_closings(
                ConsultantId(1),
                vec![closing(true, 5.0, 8_000), closing(false, 7.0, 2_000)],
            )
            .await;
        fixture
            .set_open_leads(ConsultantId(1), 9, HashMap::from([("bu".to_owned(), 4)]))
            .await;

        let saved = fixture
            .populate()
            .call(may(), &[ConsultantId(1)], &[])
            .await
            .expect("populate succeeds");

        assert_eq!(saved[0].revenue, Decimal::new(10_000, 0));
        assert_eq!(saved[0].open_opportunities, 9);
        assert_eq!(saved[0].open_opportunities_category_counts.get("bu"), Some(&4));
    }

    #[tokio::test]
    async fn unpermitted_batch_saves_nothing() {
        let fixture = Fixture::new(&[]);

        let saved = fixture
            .populate()
            .call(may(), &[ConsultantId(9)], &[])
            .await
            .expect("populate succeeds");

        assert!(saved.is_empty());
        assert_eq!(fixture.performance_row_count().await, 0);
    }
}
