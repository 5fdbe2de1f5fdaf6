//! Deterministic demo data: an in-memory dataset for running the
//! engines without a database, and the matching SQL seed for a real
//! one. Values are fixed so repeated runs produce identical output.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use courtier_core::domain::performance::{ClosedOpportunityRecord, OpenLeads};
use courtier_core::domain::portfolio::ConsultantId;
use courtier_core::errors::RepositoryError;

use crate::repositories::{
    InMemoryAoaCategoriesRepository, InMemoryClassificationsRepository,
    InMemoryClosedOpportunitiesRepository, InMemoryMonthlyAdminPerformancesRepository,
    InMemoryOpenOpportunitiesCountRepository, InMemorySalesAdminsRepository,
};
use crate::DbPool;

pub const DEMO_CONSULTANTS: &[(i64, bool)] = &[(101, true), (102, true), (103, false)];

fn closing(success: bool, open_leads: f64, revenue: i64) -> ClosedOpportunityRecord {
    ClosedOpportunityRecord {
        closed_successfully: success,
        avg_open_opportunities: open_leads,
        generated_revenue_so_far: Decimal::new(revenue, 0),
    }
}

/// The in-memory adapters pre-filled with three consultants and three
/// months of closings ending at `month`.
pub struct DemoDataset {
    pub admins: Arc<InMemorySalesAdminsRepository>,
    pub closings: Arc<InMemoryClosedOpportunitiesRepository>,
    pub open_counts: Arc<InMemoryOpenOpportunitiesCountRepository>,
    pub performances: Arc<InMemoryMonthlyAdminPerformancesRepository>,
    pub aoa_categories: Arc<InMemoryAoaCategoriesRepository>,
    pub classifications: Arc<InMemoryClassificationsRepository>,
}

impl DemoDataset {
    pub async fn seed(month: NaiveDate) -> Self {
        let dataset = Self {
            admins: Arc::new(InMemorySalesAdminsRepository::default()),
            closings: Arc::new(InMemoryClosedOpportunitiesRepository::default()),
            open_counts: Arc::new(InMemoryOpenOpportunitiesCountRepository::default()),
            performances: Arc::new(InMemoryMonthlyAdminPerformancesRepository::default()),
            aoa_categories: Arc::new(InMemoryAoaCategoriesRepository::default()),
            classifications: Arc::new(InMemoryClassificationsRepository::default()),
        };

        for (id, permitted) in DEMO_CONSULTANTS {
            dataset.admins.insert(ConsultantId(*id), *permitted).await;
        }
        dataset.aoa_categories.insert("bu").await;

        let months = [
            month.checked_sub_months(chrono::Months::new(2)).unwrap_or(month),
            month.checked_sub_months(chrono::Months::new(1)).unwrap_or(month),
            month,
        ];

        // Consultant 101 converts well on small pipelines; 102 carries
        // a bigger pipeline with mixed outcomes.
        for (index, seed_month) in months.iter().enumerate() {
            let wave = index as i64;
            dataset
                .closings
                .insert(
                    ConsultantId(101),
                    *seed_month,
                    vec![
                        closing(true, 8.0 + wave as f64, 4_000 + wave * 1_500),
                        closing(true, 12.0, 11_000),
                        closing(false, 9.0, 2_500),
                    ],
                )
                .await;
            dataset
                .closings
                .insert(
                    ConsultantId(102),
                    *seed_month,
                    vec![
                        closing(wave % 2 == 0, 45.0, 28_000 + wave * 4_000),
                        closing(false, 60.0, 52_000),
                    ],
                )
                .await;
        }

        dataset
            .open_counts
            .insert(
                ConsultantId(101),
                OpenLeads {
                    open_opportunities: 11,
                    open_opportunities_category_counts: BTreeMap::from([
                        ("bu".to_owned(), 6),
                        ("kfz".to_owned(), 5),
                    ]),
                },
            )
            .await;
        dataset
            .open_counts
            .insert(
                ConsultantId(102),
                OpenLeads {
                    open_opportunities: 48,
                    open_opportunities_category_counts: BTreeMap::from([
                        ("bu".to_owned(), 31),
                        ("phv".to_owned(), 17),
                    ]),
                },
            )
            .await;

        dataset.classifications.insert(ConsultantId(101), "bu", "high").await;
        dataset.classifications.insert(ConsultantId(102), "bu", "medium").await;

        dataset
    }
}

/// Seeds the SQL schema with the demo consultants, AOA categories and a
/// month of closed opportunities. Idempotent.
pub async fn seed_database(pool: &DbPool) -> Result<u64, RepositoryError> {
    let mut inserted = 0;

    for (id, sales_consultation) in DEMO_CONSULTANTS {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO admins (id, email, active, sales_consultation) \
             VALUES (?, ?, 1, ?)",
        )
        .bind(id)
        .bind(format!("consultant{id}@courtier.example"))
        .bind(sales_consultation)
        .execute(pool)
        .await
        .map_err(|error| RepositoryError::Backend(error.to_string()))?;
        inserted += result.rows_affected();
    }

    for (ident, used_in_aoa) in [("bu", true), ("kfz", false), ("phv", false)] {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO categories (ident, category_type, used_in_aoa) \
             VALUES (?, 'normal', ?)",
        )
        .bind(ident)
        .bind(used_in_aoa)
        .execute(pool)
        .await
        .map_err(|error| RepositoryError::Backend(error.to_string()))?;
        inserted += result.rows_affected();
    }

    let closings: &[(i64, i64, &str, bool, f64, i64, &str)] = &[
        (9001, 101, "bu", true, 8.0, 4_000, "2025-05-07"),
        (9002, 101, "bu", true, 12.0, 11_000, "2025-05-12"),
        (9003, 101, "kfz", false, 9.0, 2_500, "2025-05-21"),
        (9004, 102, "bu", true, 45.0, 28_000, "2025-05-09"),
        (9005, 102, "phv", false, 60.0, 52_000, "2025-05-28"),
    ];

    for (id, consultant_id, category, success, open_leads, revenue, closed_at) in closings {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO opportunities \
             (id, mandate_id, category_ident, state, consultant_id, closed_successfully, \
              avg_open_opportunities, generated_revenue_so_far, closed_at) \
             VALUES (?, 1, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(category)
        .bind(if *success { "completed" } else { "lost" })
        .bind(consultant_id)
        .bind(success)
        .bind(open_leads)
        .bind(revenue.to_string())
        .bind(closed_at)
        .execute(pool)
        .await
        .map_err(|error| RepositoryError::Backend(error.to_string()))?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
