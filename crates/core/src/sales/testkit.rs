//! Shared in-memory doubles for the sales interactor tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::performance::{
    ClosedOpportunityRecord, MonthlyAdminPerformance, OpenLeads, PerformanceMatrix, RecordId,
};
use crate::domain::portfolio::ConsultantId;
use crate::errors::RepositoryError;
use crate::repositories::{
    AdminPerformanceClassificationsRepository, AoaCategoriesRepository,
    ClosedOpportunitiesRepository, MonthlyAdminPerformancesRepository,
    OpenOpportunitiesCountRepository, RepositoryResult, SalesAdminsRepository,
};

use super::{
    CalculateMonthlyPerformanceMatrix, CalculateOpenLeadsCount, CalculatePerformanceMatrix,
    CalculateRevenue, GenerateHistoricalMonthlyAdminPerformance, PerformanceSettings,
    PopulateMonthlyAdminPerformance,
};

pub fn closing(success: bool, open_leads: f64, revenue: i64) -> ClosedOpportunityRecord {
    ClosedOpportunityRecord {
        closed_successfully: success,
        avg_open_opportunities: open_leads,
        generated_revenue_so_far: Decimal::new(revenue, 0),
    }
}

pub struct FakeAdmins {
    pub permitted: RwLock<Vec<ConsultantId>>,
}

#[async_trait]
impl SalesAdminsRepository for FakeAdmins {
    async fn sales_consultation_permitted(
        &self,
        consultant_id: ConsultantId,
    ) -> RepositoryResult<bool> {
        Ok(self.permitted.read().await.contains(&consultant_id))
    }

    async fn active_sales_consultant_ids(&self) -> RepositoryResult<Vec<ConsultantId>> {
        Ok(self.permitted.read().await.clone())
    }
}

#[derive(Default)]
pub struct FakeClosings {
    /// Closings returned for every month unless a monthly override
    /// exists.
    pub closings: RwLock<HashMap<ConsultantId, Vec<ClosedOpportunityRecord>>>,
    pub monthly: RwLock<HashMap<(ConsultantId, NaiveDate), Vec<ClosedOpportunityRecord>>>,
    /// Consultants whose lookups fail from the given month on, for
    /// failure-isolation tests.
    pub poisoned: RwLock<HashMap<ConsultantId, NaiveDate>>,
}

#[async_trait]
impl ClosedOpportunitiesRepository for FakeClosings {
    async fn closed_opportunities_for(
        &self,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
        _category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, Vec<ClosedOpportunityRecord>>> {
        let poisoned = self.poisoned.read().await;
        let fails = consultant_ids
            .iter()
            .any(|id| poisoned.get(id).map(|from| month >= *from).unwrap_or(false));
        if fails {
            return Err(RepositoryError::Backend("synthetic closings failure".to_owned()));
        }

        let monthly = self.monthly.read().await;
        let closings = self.closings.read().await;
        Ok(consultant_ids
            .iter()
            .filter_map(|id| {
                monthly
                    .get(&(*id, month))
                    .or_else(|| closings.get(id))
                    .map(|records| (*id, records.clone()))
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeOpenCounts {
    pub counts: RwLock<HashMap<ConsultantId, OpenLeads>>,
}

#[async_trait]
impl OpenOpportunitiesCountRepository for FakeOpenCounts {
    async fn open_opportunities_count_for(
        &self,
        consultant_ids: &[ConsultantId],
        _category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, OpenLeads>> {
        let counts = self.counts.read().await;
        Ok(consultant_ids
            .iter()
            .filter_map(|id| counts.get(id).map(|leads| (*id, leads.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct FakePerformances {
    pub rows: RwLock<Vec<MonthlyAdminPerformance>>,
    pub next_id: RwLock<i64>,
}

impl FakePerformances {
    fn latest_of<'a, I>(rows: I) -> HashMap<ConsultantId, MonthlyAdminPerformance>
    where
        I: Iterator<Item = &'a MonthlyAdminPerformance>,
    {
        let mut latest: HashMap<ConsultantId, MonthlyAdminPerformance> = HashMap::new();
        for row in rows {
            let replace = latest
                .get(&row.consultant_id)
                .map(|existing| existing.calculation_date < row.calculation_date)
                .unwrap_or(true);
            if replace {
                latest.insert(row.consultant_id, row.clone());
            }
        }
        latest
    }
}

#[async_trait]
impl MonthlyAdminPerformancesRepository for FakePerformances {
    async fn latest_before(
        &self,
        algo_version: &str,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>> {
        let rows = self.rows.read().await;
        Ok(Self::latest_of(rows.iter().filter(|row| {
            row.algo_version == algo_version
                && row.calculation_date < month
                && consultant_ids.contains(&row.consultant_id)
        })))
    }

    async fn find_for_month(
        &self,
        algo_version: &str,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| {
                row.algo_version == algo_version
                    && row.calculation_date == month
                    && consultant_ids.contains(&row.consultant_id)
            })
            .map(|row| (row.consultant_id, row.clone()))
            .collect())
    }

    async fn latest_for(
        &self,
        algo_version: &str,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>> {
        let rows = self.rows.read().await;
        Ok(Self::latest_of(rows.iter().filter(|row| {
            row.algo_version == algo_version && consultant_ids.contains(&row.consultant_id)
        })))
    }

    async fn save(
        &self,
        mut record: MonthlyAdminPerformance,
        existing_id: Option<RecordId>,
    ) -> RepositoryResult<MonthlyAdminPerformance> {
        let mut rows = self.rows.write().await;

        match existing_id {
            Some(id) => {
                record.id = Some(id);
                match rows.iter_mut().find(|row| row.id == Some(id)) {
                    Some(row) => *row = record.clone(),
                    None => {
                        return Err(RepositoryError::Backend(format!(
                            "no row with id {} to update",
                            id.0
                        )))
                    }
                }
            }
            None => {
                let mut next_id = self.next_id.write().await;
                *next_id += 1;
                record.id = Some(RecordId(*next_id));
                rows.push(record.clone());
            }
        }

        Ok(record)
    }

    async fn delete(&self, ids: &[RecordId]) -> RepositoryResult<()> {
        let mut rows = self.rows.write().await;
        rows.retain(|row| row.id.map(|id| !ids.contains(&id)).unwrap_or(true));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAoaCategories {
    pub idents: RwLock<Vec<String>>,
}

#[async_trait]
impl AoaCategoriesRepository for FakeAoaCategories {
    async fn categories_used_in_aoa(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.idents.read().await.clone())
    }
}

#[derive(Default)]
pub struct FakeClassifications {
    pub levels: RwLock<HashMap<ConsultantId, std::collections::BTreeMap<String, String>>>,
}

#[async_trait]
impl AdminPerformanceClassificationsRepository for FakeClassifications {
    async fn performance_classifications(
        &self,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, std::collections::BTreeMap<String, String>>> {
        let levels = self.levels.read().await;
        Ok(consultant_ids
            .iter()
            .filter_map(|id| levels.get(id).map(|map| (*id, map.clone())))
            .collect())
    }
}

pub struct Fixture {
    pub admins: Arc<FakeAdmins>,
    pub closings: Arc<FakeClosings>,
    pub open_counts: Arc<FakeOpenCounts>,
    pub performances: Arc<FakePerformances>,
    pub aoa_categories: Arc<FakeAoaCategories>,
    pub classifications: Arc<FakeClassifications>,
    pub settings: PerformanceSettings,
}

impl Fixture {
    pub fn new(permitted: &[ConsultantId]) -> Self {
        Self {
            admins: Arc::new(FakeAdmins { permitted: RwLock::new(permitted.to_vec()) }),
            closings: Arc::new(FakeClosings::default()),
            open_counts: Arc::new(FakeOpenCounts::default()),
            performances: Arc::new(FakePerformances::default()),
            aoa_categories: Arc::new(FakeAoaCategories::default()),
            classifications: Arc::new(FakeClassifications::default()),
            settings: PerformanceSettings {
                algo_version: "v2".to_owned(),
                remember_window_size: 12,
            },
        }
    }

    pub fn with_window(mut self, remember_window_size: u32) -> Self {
        self.settings.remember_window_size = remember_window_size;
        self
    }

    pub fn populate(&self) -> PopulateMonthlyAdminPerformance {
        PopulateMonthlyAdminPerformance::new(
            self.admins.clone(),
            self.performances.clone(),
            self.classifications.clone(),
            CalculateRevenue::new(self.admins.clone(), self.closings.clone()),
            CalculateOpenLeadsCount::new(self.admins.clone(), self.open_counts.clone()),
            CalculatePerformanceMatrix::new(CalculateMonthlyPerformanceMatrix::new(
                self.closings.clone(),
            )),
            CalculateMonthlyPerformanceMatrix::new(self.closings.clone()),
            self.settings.clone(),
        )
    }

    pub fn historical(&self, epoch: NaiveDate) -> GenerateHistoricalMonthlyAdminPerformance {
        GenerateHistoricalMonthlyAdminPerformance::new(
            self.populate(),
            self.admins.clone(),
            self.performances.clone(),
            self.aoa_categories.clone(),
            self.settings.clone(),
            epoch,
        )
    }

    pub async fn add_closings(
        &self,
        consultant_id: ConsultantId,
        records: Vec<ClosedOpportunityRecord>,
    ) {
        self.closings.closings.write().await.insert(consultant_id, records);
    }

    pub async fn add_closings_for_month(
        &self,
        consultant_id: ConsultantId,
        month: NaiveDate,
        records: Vec<ClosedOpportunityRecord>,
    ) {
        self.closings.monthly.write().await.insert((consultant_id, month), records);
    }

    pub async fn poison_closings_from(&self, consultant_id: ConsultantId, month: NaiveDate) {
        self.closings.poisoned.write().await.insert(consultant_id, month);
    }

    pub async fn set_open_leads(
        &self,
        consultant_id: ConsultantId,
        open_opportunities: i64,
        category_counts: HashMap<String, i64>,
    ) {
        self.open_counts.counts.write().await.insert(
            consultant_id,
            OpenLeads {
                open_opportunities,
                open_opportunities_category_counts: category_counts.into_iter().collect(),
            },
        );
    }

    pub async fn seed_performance(
        &self,
        consultant_id: ConsultantId,
        month: NaiveDate,
        matrix: PerformanceMatrix,
        months_count: u32,
    ) {
        let record = MonthlyAdminPerformance {
            id: None,
            consultant_id,
            calculation_date: month,
            revenue: Decimal::ZERO,
            open_opportunities: 0,
            open_opportunities_category_counts: Default::default(),
            performance_level: Default::default(),
            performance_matrix: matrix,
            months_count,
            algo_version: self.settings.algo_version.clone(),
        };
        self.performances.save(record, None).await.expect("seed row saves");
    }

    pub async fn performance_row_count(&self) -> usize {
        self.performances.rows.read().await.len()
    }

    pub async fn rows_for(&self, consultant_id: ConsultantId) -> Vec<MonthlyAdminPerformance> {
        self.performances
            .rows
            .read()
            .await
            .iter()
            .filter(|row| row.consultant_id == consultant_id)
            .cloned()
            .collect()
    }
}
