//! Sales performance engine: monthly conversion matrices, the rolling
//! average with its forget window, snapshot population and the
//! historical backfill.

mod gather;
mod historical;
mod level;
mod matrix;
mod populate;

#[cfg(test)]
pub(crate) mod testkit;

pub use gather::{CalculateOpenLeadsCount, CalculateRevenue};
pub use historical::GenerateHistoricalMonthlyAdminPerformance;
pub use level::UpdateConsultantPerformanceLevel;
pub use matrix::{
    aggregate_monthly_matrix, roll_cell, roll_matrix, CalculateMonthlyPerformanceMatrix,
    CalculatePerformanceMatrix, RollingInput,
};
pub use populate::{PerformanceSettings, PopulateMonthlyAdminPerformance};

use chrono::{Datelike, Months, NaiveDate};

/// First day of `date`'s month.
pub fn beginning_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month following `month`.
pub fn next_month(month: NaiveDate) -> NaiveDate {
    beginning_of_month(month)
        .checked_add_months(Months::new(1))
        .unwrap_or(month)
}

/// First day of the month `months` before `month`.
pub fn months_back(month: NaiveDate, months: u32) -> NaiveDate {
    beginning_of_month(month)
        .checked_sub_months(Months::new(months))
        .unwrap_or(month)
}
