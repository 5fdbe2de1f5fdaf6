//! Historical backfill of the monthly snapshots, strictly sequential
//! with per-consultant failure isolation: one consultant's failure is
//! logged, their rows from this run are rolled back, and the batch
//! moves on.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info};

use crate::domain::performance::RecordId;
use crate::domain::portfolio::ConsultantId;
use crate::errors::ApplicationError;
use crate::repositories::{
    AoaCategoriesRepository, MonthlyAdminPerformancesRepository, SalesAdminsRepository,
};

use super::populate::{PerformanceSettings, PopulateMonthlyAdminPerformance};
use super::{beginning_of_month, next_month};

pub struct GenerateHistoricalMonthlyAdminPerformance {
    populate: PopulateMonthlyAdminPerformance,
    admins: Arc<dyn SalesAdminsRepository>,
    performances: Arc<dyn MonthlyAdminPerformancesRepository>,
    aoa_categories: Arc<dyn AoaCategoriesRepository>,
    settings: PerformanceSettings,
    epoch: NaiveDate,
}

impl GenerateHistoricalMonthlyAdminPerformance {
    pub fn new(
        populate: PopulateMonthlyAdminPerformance,
        admins: Arc<dyn SalesAdminsRepository>,
        performances: Arc<dyn MonthlyAdminPerformancesRepository>,
        aoa_categories: Arc<dyn AoaCategoriesRepository>,
        settings: PerformanceSettings,
        epoch: NaiveDate,
    ) -> Self {
        Self { populate, admins, performances, aoa_categories, settings, epoch }
    }

    pub async fn call(&self, today: NaiveDate) -> Result<(), ApplicationError> {
        let consultants = self.admins.active_sales_consultant_ids().await?;
        let category_idents = self.aoa_categories.categories_used_in_aoa().await?;
        let current_month = beginning_of_month(today);

        for consultant_id in consultants {
            match self
                .backfill_consultant(consultant_id, &category_idents, current_month)
                .await
            {
                Ok(months) => {
                    if months > 0 {
                        info!(
                            consultant_id = consultant_id.0,
                            months, "backfilled monthly performance"
                        );
                    }
                }
                Err(error) => {
                    error!(
                        consultant_id = consultant_id.0,
                        %error,
                        "monthly performance backfill failed; rolled back this run's rows"
                    );
                }
            }
        }

        Ok(())
    }

    /// Backfills one consultant from the month after their last record
    /// (or the epoch) through the current month. On any failure the
    /// rows written during THIS run are deleted before the error is
    /// returned, so no half-computed state persists.
    async fn backfill_consultant(
        &self,
        consultant_id: ConsultantId,
        category_idents: &[String],
        current_month: NaiveDate,
    ) -> Result<u32, ApplicationError> {
        let latest = self
            .performances
            .latest_for(&self.settings.algo_version, &[consultant_id])
            .await?;

        let start = latest
            .get(&consultant_id)
            .map(|record| next_month(record.calculation_date))
            .unwrap_or(beginning_of_month(self.epoch))
            .max(beginning_of_month(self.epoch));

        let mut written: Vec<RecordId> = Vec::new();
        let mut months: u32 = 0;
        let mut month = start;

        while month <= current_month {
            match self.populate.call(month, &[consultant_id], category_idents).await {
                Ok(records) => {
                    written.extend(records.iter().filter_map(|record| record.id));
                    months += 1;
                }
                Err(populate_error) => {
                    if !written.is_empty() {
                        self.performances.delete(&written).await?;
                    }
                    return Err(ApplicationError::computation(consultant_id, &populate_error));
                }
            }
            month = next_month(month);
        }

        Ok(months)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::performance::{MatrixShape, PerformanceMatrix};
    use crate::domain::portfolio::ConsultantId;

    use crate::sales::testkit::{closing, Fixture};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[tokio::test]
    async fn backfills_every_month_from_epoch_through_today() {
        let fixture = Fixture::new(&[ConsultantId(1)]);
        fixture.add_closings(ConsultantId(1), vec![closing(true, 10.0, 5_000)]).await;

        fixture
            .historical(date(2025, 1, 1))
            .call(date(2025, 4, 20))
            .await
            .expect("backfill succeeds");

        let rows = fixture.rows_for(ConsultantId(1)).await;
        assert_eq!(rows.len(), 4, "January through April");
        assert_eq!(rows[0].calculation_date, date(2025, 1, 1));
        assert_eq!(rows[3].calculation_date, date(2025, 4, 1));
    }

    #[tokio::test]
    async fn resumes_from_the_month_after_the_last_record() {
        let fixture = Fixture::new(&[ConsultantId(1)]);
        let shape = MatrixShape::default();
        fixture
            .seed_performance(ConsultantId(1), date(2025, 2, 1), PerformanceMatrix::empty(&shape), 2)
            .await;

        fixture
            .historical(date(2025, 1, 1))
            .call(date(2025, 4, 20))
            .await
            .expect("backfill succeeds");

        let rows = fixture.rows_for(ConsultantId(1)).await;
        // Seeded February row plus fresh March and April.
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().any(|row| row.calculation_date == date(2025, 3, 1)));
        assert!(rows.iter().any(|row| row.calculation_date == date(2025, 4, 1)));
    }

    #[tokio::test]
    async fn months_count_accumulates_across_the_backfill() {
        let fixture = Fixture::new(&[ConsultantId(1)]);
        fixture.add_closings(ConsultantId(1), vec![closing(true, 10.0, 5_000)]).await;

        fixture
            .historical(date(2025, 1, 1))
            .call(date(2025, 3, 10))
            .await
            .expect("backfill succeeds");

        let rows = fixture.rows_for(ConsultantId(1)).await;
        let counts: Vec<u32> = rows.iter().map(|row| row.months_count).collect();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn one_consultants_failure_leaves_the_others_records_intact() {
        let fixture = Fixture::new(&[ConsultantId(1), ConsultantId(2)]);
        fixture.add_closings(ConsultantId(1), vec![closing(true, 10.0, 5_000)]).await;
        fixture.add_closings(ConsultantId(2), vec![closing(false, 20.0, 8_000)]).await;
        // Consultant 2 computes January and February, then fails in
        // March mid-run.
        fixture.poison_closings_from(ConsultantId(2), date(2025, 3, 1)).await;

        fixture
            .historical(date(2025, 1, 1))
            .call(date(2025, 3, 10))
            .await
            .expect("the batch itself never fails");

        assert_eq!(fixture.rows_for(ConsultantId(1)).await.len(), 3, "consultant A persisted");
        assert!(
            fixture.rows_for(ConsultantId(2)).await.is_empty(),
            "consultant B's partial months rolled back to zero rows"
        );
    }
}
