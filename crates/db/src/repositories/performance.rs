//! SQL adapters for the monthly performance snapshot and the manual
//! classification table. Latest-row reduction happens in Rust; the
//! result sets are one row per consultant-month and stay small.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use courtier_core::domain::performance::{MonthlyAdminPerformance, PerformanceMatrix, RecordId};
use courtier_core::domain::portfolio::ConsultantId;
use courtier_core::repositories::{
    AdminPerformanceClassificationsRepository, MonthlyAdminPerformancesRepository,
    RepositoryResult,
};

use super::{backend, decode};
use crate::DbPool;

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub struct SqlMonthlyAdminPerformancesRepository {
    pool: DbPool,
}

impl SqlMonthlyAdminPerformancesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn decode_row(row: &SqliteRow) -> RepositoryResult<MonthlyAdminPerformance> {
        let revenue: String = row.try_get("revenue").map_err(backend)?;
        let category_counts: String =
            row.try_get("open_opportunities_category_counts").map_err(backend)?;
        let performance_level: String = row.try_get("performance_level").map_err(backend)?;
        let performance_matrix: String = row.try_get("performance_matrix").map_err(backend)?;
        let months_count: i64 = row.try_get("months_count").map_err(backend)?;

        Ok(MonthlyAdminPerformance {
            id: Some(RecordId(row.try_get("id").map_err(backend)?)),
            consultant_id: ConsultantId(row.try_get("consultant_id").map_err(backend)?),
            calculation_date: row.try_get("calculation_date").map_err(backend)?,
            revenue: Decimal::from_str(&revenue).map_err(decode)?,
            open_opportunities: row.try_get("open_opportunities").map_err(backend)?,
            open_opportunities_category_counts: serde_json::from_str(&category_counts)
                .map_err(decode)?,
            performance_level: serde_json::from_str(&performance_level).map_err(decode)?,
            performance_matrix: serde_json::from_str::<PerformanceMatrix>(&performance_matrix)
                .map_err(decode)?,
            months_count: u32::try_from(months_count.max(0)).unwrap_or(u32::MAX),
            algo_version: row.try_get("algo_version").map_err(backend)?,
        })
    }

    async fn fetch_rows(
        &self,
        algo_version: &str,
        consultant_ids: &[ConsultantId],
        before: Option<NaiveDate>,
    ) -> RepositoryResult<Vec<MonthlyAdminPerformance>> {
        if consultant_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT * FROM monthly_admin_performances \
             WHERE algo_version = ? AND consultant_id IN ({})",
            placeholders(consultant_ids.len())
        );
        if before.is_some() {
            sql.push_str(" AND calculation_date < ?");
        }

        let mut query = sqlx::query(&sql).bind(algo_version);
        for consultant_id in consultant_ids {
            query = query.bind(consultant_id.0);
        }
        if let Some(before) = before {
            query = query.bind(before);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        rows.iter().map(Self::decode_row).collect()
    }
}

fn latest_per_consultant(
    rows: Vec<MonthlyAdminPerformance>,
) -> HashMap<ConsultantId, MonthlyAdminPerformance> {
    let mut latest: HashMap<ConsultantId, MonthlyAdminPerformance> = HashMap::new();
    for row in rows {
        let replace = latest
            .get(&row.consultant_id)
            .map(|existing| existing.calculation_date < row.calculation_date)
            .unwrap_or(true);
        if replace {
            latest.insert(row.consultant_id, row);
        }
    }
    latest
}

#[async_trait]
impl MonthlyAdminPerformancesRepository for SqlMonthlyAdminPerformancesRepository {
    async fn latest_before(
        &self,
        algo_version: &str,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>> {
        let rows = self.fetch_rows(algo_version, consultant_ids, Some(month)).await?;
        Ok(latest_per_consultant(rows))
    }

    async fn find_for_month(
        &self,
        algo_version: &str,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>> {
        let rows = self.fetch_rows(algo_version, consultant_ids, None).await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.calculation_date == month)
            .map(|row| (row.consultant_id, row))
            .collect())
    }

    async fn latest_for(
        &self,
        algo_version: &str,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>> {
        let rows = self.fetch_rows(algo_version, consultant_ids, None).await?;
        Ok(latest_per_consultant(rows))
    }

    async fn save(
        &self,
        mut record: MonthlyAdminPerformance,
        existing_id: Option<RecordId>,
    ) -> RepositoryResult<MonthlyAdminPerformance> {
        let category_counts =
            serde_json::to_string(&record.open_opportunities_category_counts).map_err(decode)?;
        let performance_level =
            serde_json::to_string(&record.performance_level).map_err(decode)?;
        let performance_matrix =
            serde_json::to_string(&record.performance_matrix).map_err(decode)?;

        match existing_id {
            Some(id) => {
                sqlx::query(
                    "UPDATE monthly_admin_performances SET revenue = ?, \
                     open_opportunities = ?, open_opportunities_category_counts = ?, \
                     performance_level = ?, performance_matrix = ?, months_count = ? \
                     WHERE id = ?",
                )
                .bind(record.revenue.to_string())
                .bind(record.open_opportunities)
                .bind(&category_counts)
                .bind(&performance_level)
                .bind(&performance_matrix)
                .bind(i64::from(record.months_count))
                .bind(id.0)
                .execute(&self.pool)
                .await
                .map_err(backend)?;

                record.id = Some(id);
            }
            None => {
                // The unique key on (consultant, month, algo_version)
                // makes concurrent population requests converge on one
                // row instead of duplicating it.
                let row = sqlx::query(
                    "INSERT INTO monthly_admin_performances \
                     (consultant_id, calculation_date, revenue, open_opportunities, \
                      open_opportunities_category_counts, performance_level, \
                      performance_matrix, months_count, algo_version) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
                     ON CONFLICT (consultant_id, calculation_date, algo_version) \
                     DO UPDATE SET revenue = excluded.revenue, \
                       open_opportunities = excluded.open_opportunities, \
                       open_opportunities_category_counts = excluded.open_opportunities_category_counts, \
                       performance_level = excluded.performance_level, \
                       performance_matrix = excluded.performance_matrix, \
                       months_count = excluded.months_count \
                     RETURNING id",
                )
                .bind(record.consultant_id.0)
                .bind(record.calculation_date)
                .bind(record.revenue.to_string())
                .bind(record.open_opportunities)
                .bind(&category_counts)
                .bind(&performance_level)
                .bind(&performance_matrix)
                .bind(i64::from(record.months_count))
                .bind(&record.algo_version)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;

                record.id = Some(RecordId(row.try_get("id").map_err(backend)?));
            }
        }

        Ok(record)
    }

    async fn delete(&self, ids: &[RecordId]) -> RepositoryResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "DELETE FROM monthly_admin_performances WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.0);
        }
        query.execute(&self.pool).await.map_err(backend)?;
        Ok(())
    }
}

pub struct SqlAdminPerformanceClassificationsRepository {
    pool: DbPool,
}

impl SqlAdminPerformanceClassificationsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminPerformanceClassificationsRepository for SqlAdminPerformanceClassificationsRepository {
    async fn performance_classifications(
        &self,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, BTreeMap<String, String>>> {
        if consultant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT consultant_id, category_ident, performance_level \
             FROM admin_performance_classifications WHERE consultant_id IN ({})",
            placeholders(consultant_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for consultant_id in consultant_ids {
            query = query.bind(consultant_id.0);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;

        let mut classifications: HashMap<ConsultantId, BTreeMap<String, String>> = HashMap::new();
        for row in rows {
            let consultant_id = ConsultantId(row.try_get("consultant_id").map_err(backend)?);
            let category_ident: String = row.try_get("category_ident").map_err(backend)?;
            let level: String = row.try_get("performance_level").map_err(backend)?;
            classifications.entry(consultant_id).or_default().insert(category_ident, level);
        }

        Ok(classifications)
    }
}
