//! The bucketed conversion-rate matrix: monthly aggregation from closed
//! opportunities and the exponential-style rolling update across
//! months.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::performance::{ClosedOpportunityRecord, MatrixShape, PerformanceMatrix};
use crate::domain::portfolio::ConsultantId;
use crate::errors::ApplicationError;
use crate::repositories::ClosedOpportunitiesRepository;

/// Per-cell conversion rates for one month of closings. Every record
/// lands in exactly one cell; rates are successes over total.
pub fn aggregate_monthly_matrix(
    shape: &MatrixShape,
    records: &[ClosedOpportunityRecord],
) -> PerformanceMatrix {
    let mut tallies: HashMap<(u32, u32), (u32, u32)> = HashMap::new();

    for record in records {
        let cell = (
            shape.open_leads_bucket(record.avg_open_opportunities),
            shape.revenue_bucket(record.generated_revenue_so_far),
        );
        let tally = tallies.entry(cell).or_insert((0, 0));
        tally.1 += 1;
        if record.closed_successfully {
            tally.0 += 1;
        }
    }

    let mut matrix = PerformanceMatrix::empty(shape);
    for ((open_leads, revenue), (successes, total)) in tallies {
        matrix.set(open_leads, revenue, Some(f64::from(successes) / f64::from(total)));
    }

    matrix
}

/// Rolling update of a single cell.
///
/// The four-case table over "no sample" is deliberate: a present value
/// always overrides an absent one, two absents remain absent, and only
/// two present values compute. With a `forgotten` sample (the month
/// leaving the remember window) the update is a sliding-window mean;
/// without one it degrades to the plain incremental mean.
pub fn roll_cell(
    old: Option<f64>,
    fresh: Option<f64>,
    forgotten: Option<f64>,
    count: u32,
) -> Option<f64> {
    match (old, fresh) {
        (Some(old), Some(fresh)) => {
            if count == 0 {
                return Some(fresh);
            }
            let outgoing = forgotten.unwrap_or(old);
            let rolled = old + (fresh - outgoing) / f64::from(count);
            Some(rolled.clamp(0.0, 1.0))
        }
        (Some(old), None) => Some(old),
        (None, Some(fresh)) => Some(fresh),
        (None, None) => None,
    }
}

/// Cell-wise rolling update across the whole shape.
pub fn roll_matrix(
    shape: &MatrixShape,
    old: &PerformanceMatrix,
    fresh: &PerformanceMatrix,
    forgotten: Option<&PerformanceMatrix>,
    count: u32,
) -> PerformanceMatrix {
    let mut rolled = PerformanceMatrix::empty(shape);

    for open_leads in &shape.open_leads_buckets {
        for revenue in &shape.revenue_buckets {
            let cell = roll_cell(
                old.get(*open_leads, *revenue),
                fresh.get(*open_leads, *revenue),
                forgotten.and_then(|matrix| matrix.get(*open_leads, *revenue)),
                count,
            );
            rolled.set(*open_leads, *revenue, cell);
        }
    }

    rolled
}

/// Builds each consultant's matrix for one month of closings. A
/// consultant with no closings gets the empty matrix of the full shape.
pub struct CalculateMonthlyPerformanceMatrix {
    closed_opportunities: Arc<dyn ClosedOpportunitiesRepository>,
    shape: MatrixShape,
}

impl CalculateMonthlyPerformanceMatrix {
    pub fn new(closed_opportunities: Arc<dyn ClosedOpportunitiesRepository>) -> Self {
        Self { closed_opportunities, shape: MatrixShape::default() }
    }

    pub fn with_shape(
        closed_opportunities: Arc<dyn ClosedOpportunitiesRepository>,
        shape: MatrixShape,
    ) -> Self {
        Self { closed_opportunities, shape }
    }

    pub fn shape(&self) -> &MatrixShape {
        &self.shape
    }

    pub async fn call(
        &self,
        beginning_of_month: NaiveDate,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> Result<HashMap<ConsultantId, PerformanceMatrix>, ApplicationError> {
        let closings = self
            .closed_opportunities
            .closed_opportunities_for(beginning_of_month, consultant_ids, category_idents)
            .await?;

        let mut matrices = HashMap::with_capacity(consultant_ids.len());
        for consultant_id in consultant_ids {
            let matrix = match closings.get(consultant_id) {
                Some(records) => aggregate_monthly_matrix(&self.shape, records),
                None => PerformanceMatrix::empty(&self.shape),
            };
            matrices.insert(*consultant_id, matrix);
        }

        Ok(matrices)
    }
}

/// Prior-average input for one consultant's rolling update.
#[derive(Clone, Debug)]
pub struct RollingInput {
    pub last: PerformanceMatrix,
    /// Months in the window including the incoming one; the divisor.
    pub count: u32,
    /// Matrix of the month falling out of the remember window, when the
    /// window is already full.
    pub forgotten: Option<PerformanceMatrix>,
}

/// Rolls each consultant's average forward by one month. Consultants
/// without a prior average take the fresh month as-is.
pub struct CalculatePerformanceMatrix {
    monthly: CalculateMonthlyPerformanceMatrix,
}

impl CalculatePerformanceMatrix {
    pub fn new(monthly: CalculateMonthlyPerformanceMatrix) -> Self {
        Self { monthly }
    }

    pub async fn call(
        &self,
        beginning_of_month: NaiveDate,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
        last_averages: &HashMap<ConsultantId, RollingInput>,
    ) -> Result<HashMap<ConsultantId, PerformanceMatrix>, ApplicationError> {
        let fresh = self.monthly.call(beginning_of_month, consultant_ids, category_idents).await?;

        let mut rolled = HashMap::with_capacity(fresh.len());
        for (consultant_id, fresh_matrix) in fresh {
            let matrix = match last_averages.get(&consultant_id) {
                None => fresh_matrix,
                Some(input) => roll_matrix(
                    self.monthly.shape(),
                    &input.last,
                    &fresh_matrix,
                    input.forgotten.as_ref(),
                    input.count,
                ),
            };
            rolled.insert(consultant_id, matrix);
        }

        Ok(rolled)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::performance::{ClosedOpportunityRecord, MatrixShape, PerformanceMatrix};
    use crate::domain::portfolio::ConsultantId;
    use crate::repositories::{ClosedOpportunitiesRepository, RepositoryResult};

    use super::{
        aggregate_monthly_matrix, roll_cell, roll_matrix, CalculateMonthlyPerformanceMatrix,
        CalculatePerformanceMatrix, RollingInput,
    };

    fn record(success: bool, open_leads: f64, revenue: i64) -> ClosedOpportunityRecord {
        ClosedOpportunityRecord {
            closed_successfully: success,
            avg_open_opportunities: open_leads,
            generated_revenue_so_far: Decimal::new(revenue, 0),
        }
    }

    struct FakeClosings {
        closings: HashMap<ConsultantId, Vec<ClosedOpportunityRecord>>,
    }

    #[async_trait]
    impl ClosedOpportunitiesRepository for FakeClosings {
        async fn closed_opportunities_for(
            &self,
            _month: NaiveDate,
            _consultant_ids: &[ConsultantId],
            _category_idents: &[String],
        ) -> RepositoryResult<HashMap<ConsultantId, Vec<ClosedOpportunityRecord>>> {
            Ok(self.closings.clone())
        }
    }

    fn month() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    #[test]
    fn aggregation_computes_successes_over_total_per_cell() {
        let shape = MatrixShape::default();
        let records = vec![
            record(true, 8.0, 2_500),
            record(false, 9.5, 2_900),
            record(true, 7.0, 2_000),
            record(true, 55.0, 40_000),
        ];

        let matrix = aggregate_monthly_matrix(&shape, &records);

        // Three records share the (10, 3000) cell, two successful.
        let rate = matrix.get(10, 3_000).expect("cell has samples");
        assert!((rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(matrix.get(60, 45_000), Some(1.0));
        assert_eq!(matrix.get(20, 3_000), None);
    }

    #[test]
    fn out_of_range_closings_clamp_into_the_max_bucket() {
        let shape = MatrixShape::default();
        let records = vec![record(true, 1_000.0, 5_000_000)];

        let matrix = aggregate_monthly_matrix(&shape, &records);

        assert_eq!(matrix.get(140, 69_000), Some(1.0), "never dropped, always clamped");
    }

    #[test]
    fn roll_cell_matches_the_sliding_window_fixture() {
        // old = 0.5 at count = 4, fresh sample 1.0, forgotten 0.2:
        // 0.5 + (1.0 - 0.2) / 4 = 0.7
        let rolled = roll_cell(Some(0.5), Some(1.0), Some(0.2), 4).expect("present");
        assert!((rolled - 0.7).abs() < 1e-12);
    }

    #[test]
    fn roll_cell_matches_the_incremental_mean_fixture() {
        // count = 3, old = 0.4, fresh = 0.7, nothing forgotten yet:
        // 0.4 + (0.7 - 0.4) / 3 = 0.5
        let rolled = roll_cell(Some(0.4), Some(0.7), None, 3).expect("present");
        assert!((rolled - 0.5).abs() < 1e-12);
    }

    #[test]
    fn roll_cell_truth_table_over_missing_samples() {
        assert_eq!(roll_cell(Some(0.6), None, None, 4), Some(0.6), "old kept without sample");
        assert_eq!(roll_cell(None, Some(0.8), None, 4), Some(0.8), "fresh overrides absent");
        assert_eq!(roll_cell(None, None, Some(0.3), 4), None, "two absents stay absent");
    }

    #[test]
    fn roll_cell_result_stays_within_unit_interval() {
        let rolled = roll_cell(Some(0.9), Some(1.0), Some(0.0), 2).expect("present");
        assert!(rolled <= 1.0);
        let rolled = roll_cell(Some(0.1), Some(0.0), Some(1.0), 2).expect("present");
        assert!(rolled >= 0.0);
    }

    #[test]
    fn roll_matrix_walks_every_cell_of_the_shape() {
        let shape = MatrixShape::default();
        let mut old = PerformanceMatrix::empty(&shape);
        old.set(10, 3_000, Some(0.4));
        old.set(20, 9_000, Some(0.9));

        let mut fresh = PerformanceMatrix::empty(&shape);
        fresh.set(10, 3_000, Some(0.7));
        fresh.set(30, 15_000, Some(0.2));

        let rolled = roll_matrix(&shape, &old, &fresh, None, 3);

        let updated = rolled.get(10, 3_000).expect("computed");
        assert!((updated - 0.5).abs() < 1e-12);
        assert_eq!(rolled.get(20, 9_000), Some(0.9), "no fresh sample keeps old");
        assert_eq!(rolled.get(30, 15_000), Some(0.2), "fresh fills absent cell");
        assert_eq!(rolled.get(40, 21_000), None);
    }

    #[tokio::test]
    async fn consultant_without_closings_gets_an_all_empty_matrix() {
        let repo = Arc::new(FakeClosings {
            closings: HashMap::from([(
                ConsultantId(1),
                vec![record(true, 12.0, 10_000)],
            )]),
        });
        let interactor = CalculateMonthlyPerformanceMatrix::new(repo);

        let matrices = interactor
            .call(month(), &[ConsultantId(1), ConsultantId(2)], &[])
            .await
            .expect("aggregation succeeds");

        assert!(!matrices[&ConsultantId(1)].is_all_empty());
        assert!(matrices[&ConsultantId(2)].is_all_empty());
        assert_eq!(matrices[&ConsultantId(2)].iter().count(), 14 * 12, "full shape");
    }

    #[tokio::test]
    async fn first_month_without_prior_average_is_taken_as_is() {
        let repo = Arc::new(FakeClosings {
            closings: HashMap::from([(ConsultantId(1), vec![record(true, 12.0, 10_000)])]),
        });
        let interactor =
            CalculatePerformanceMatrix::new(CalculateMonthlyPerformanceMatrix::new(repo));

        let rolled = interactor
            .call(month(), &[ConsultantId(1)], &[], &HashMap::new())
            .await
            .expect("rolling succeeds");

        assert_eq!(rolled[&ConsultantId(1)].get(20, 15_000), Some(1.0));
    }

    #[tokio::test]
    async fn prior_average_is_rolled_cell_wise() {
        let repo = Arc::new(FakeClosings {
            closings: HashMap::from([(
                ConsultantId(1),
                // One failed closing in the (20, 15000) cell: fresh 0.0.
                vec![record(false, 12.0, 10_000)],
            )]),
        });
        let shape = MatrixShape::default();
        let mut last = PerformanceMatrix::empty(&shape);
        last.set(20, 15_000, Some(0.6));

        let inputs = HashMap::from([(
            ConsultantId(1),
            RollingInput { last, count: 3, forgotten: None },
        )]);
        let interactor =
            CalculatePerformanceMatrix::new(CalculateMonthlyPerformanceMatrix::new(repo));

        let rolled = interactor
            .call(month(), &[ConsultantId(1)], &[], &inputs)
            .await
            .expect("rolling succeeds");

        // 0.6 + (0.0 - 0.6) / 3 = 0.4
        let cell = rolled[&ConsultantId(1)].get(20, 15_000).expect("present");
        assert!((cell - 0.4).abs() < 1e-12);
    }
}
