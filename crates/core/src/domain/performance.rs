//! Consultant performance data: the bucketed conversion-rate matrix and
//! the persisted monthly snapshot it is rolled into.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::portfolio::ConsultantId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

/// Bucket boundaries for both matrix axes. Injected into the engines so
/// the boundaries stay a single source of truth without global state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixShape {
    pub open_leads_buckets: Vec<u32>,
    pub revenue_buckets: Vec<u32>,
}

impl Default for MatrixShape {
    fn default() -> Self {
        Self {
            open_leads_buckets: (1..=14).map(|step| step * 10).collect(),
            revenue_buckets: (0..=11).map(|step| 3_000 + step * 6_000).collect(),
        }
    }
}

impl MatrixShape {
    /// Rounds a raw value up to the nearest boundary; values above the
    /// last boundary clamp into it. Data is never dropped.
    fn bucket(boundaries: &[u32], value: f64) -> u32 {
        let Some(last) = boundaries.last().copied() else { return 0 };
        if value.is_nan() {
            return last;
        }

        boundaries
            .iter()
            .copied()
            .find(|boundary| value <= f64::from(*boundary))
            .unwrap_or(last)
    }

    pub fn open_leads_bucket(&self, avg_open_opportunities: f64) -> u32 {
        Self::bucket(&self.open_leads_buckets, avg_open_opportunities)
    }

    pub fn revenue_bucket(&self, revenue: Decimal) -> u32 {
        Self::bucket(&self.revenue_buckets, revenue.to_f64().unwrap_or(f64::MAX))
    }
}

/// Conversion rates per (open-leads bucket, revenue bucket). Every cell
/// of the shape is present; `None` marks a cell no sample ever hit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerformanceMatrix {
    cells: BTreeMap<u32, BTreeMap<u32, Option<f64>>>,
}

impl PerformanceMatrix {
    /// A matrix of the full shape with no data in any cell.
    pub fn empty(shape: &MatrixShape) -> Self {
        let mut cells = BTreeMap::new();
        for open_leads in &shape.open_leads_buckets {
            let row: BTreeMap<u32, Option<f64>> =
                shape.revenue_buckets.iter().map(|revenue| (*revenue, None)).collect();
            cells.insert(*open_leads, row);
        }
        Self { cells }
    }

    pub fn get(&self, open_leads_bucket: u32, revenue_bucket: u32) -> Option<f64> {
        self.cells.get(&open_leads_bucket).and_then(|row| row.get(&revenue_bucket)).copied().flatten()
    }

    pub fn set(&mut self, open_leads_bucket: u32, revenue_bucket: u32, rate: Option<f64>) {
        if let Some(row) = self.cells.get_mut(&open_leads_bucket) {
            if let Some(cell) = row.get_mut(&revenue_bucket) {
                *cell = rate;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, Option<f64>)> + '_ {
        self.cells.iter().flat_map(|(open_leads, row)| {
            row.iter().map(move |(revenue, rate)| (*open_leads, *revenue, *rate))
        })
    }

    pub fn is_all_empty(&self) -> bool {
        self.iter().all(|(_, _, rate)| rate.is_none())
    }
}

/// Input row for the monthly aggregation: one closed opportunity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClosedOpportunityRecord {
    pub closed_successfully: bool,
    pub avg_open_opportunities: f64,
    pub generated_revenue_so_far: Decimal,
}

/// Open-pipeline counts for one consultant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLeads {
    pub open_opportunities: i64,
    pub open_opportunities_category_counts: BTreeMap<String, i64>,
}

/// Manual performance classification a consultant can be overridden to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    High,
    Medium,
    Low,
}

impl PerformanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Persisted monthly snapshot, one row per (consultant, month,
/// algo_version).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAdminPerformance {
    pub id: Option<RecordId>,
    pub consultant_id: ConsultantId,
    pub calculation_date: NaiveDate,
    pub revenue: Decimal,
    pub open_opportunities: i64,
    pub open_opportunities_category_counts: BTreeMap<String, i64>,
    pub performance_level: BTreeMap<String, String>,
    pub performance_matrix: PerformanceMatrix,
    pub months_count: u32,
    pub algo_version: String,
}
