//! In-memory adapters for every core port. They back the test suites
//! and the deterministic demo dataset; behavior mirrors the SQL
//! adapters including the upsert-by-id contract.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use courtier_core::domain::performance::{
    ClosedOpportunityRecord, MonthlyAdminPerformance, OpenLeads, RecordId,
};
use courtier_core::domain::portfolio::{ConsultantId, Opportunity, OpportunityId, OpportunityState};
use courtier_core::domain::questionnaire::{AnswerSet, QuestionAnswer};
use courtier_core::errors::RepositoryError;
use courtier_core::repositories::{
    AdminPerformanceClassificationsRepository, AoaCategoriesRepository,
    ClosedOpportunitiesRepository, EventQueue, MandateRepository,
    MonthlyAdminPerformancesRepository, OpenOpportunitiesCountRepository, OpportunityAttrs,
    OpportunityRepository, ProfileDataRepository, RepositoryResult, ResponseRepository,
    SalesAdminsRepository,
};
use courtier_core::{Gender, Mandate, MandateId};

fn month_of(date: NaiveDate) -> NaiveDate {
    use chrono::Datelike;
    date.with_day(1).unwrap_or(date)
}

#[derive(Default)]
pub struct InMemoryMandateRepository {
    mandates: RwLock<HashMap<i64, Mandate>>,
}

impl InMemoryMandateRepository {
    pub async fn insert(&self, mandate: Mandate) {
        self.mandates.write().await.insert(mandate.id.0, mandate);
    }
}

#[async_trait]
impl MandateRepository for InMemoryMandateRepository {
    async fn find(&self, id: MandateId) -> RepositoryResult<Option<Mandate>> {
        Ok(self.mandates.read().await.get(&id.0).cloned())
    }

    async fn update_birthdate(&self, id: MandateId, birthdate: NaiveDate) -> RepositoryResult<()> {
        if let Some(mandate) = self.mandates.write().await.get_mut(&id.0) {
            mandate.birthdate = Some(birthdate);
        }
        Ok(())
    }

    async fn update_gender(&self, id: MandateId, gender: Gender) -> RepositoryResult<()> {
        if let Some(mandate) = self.mandates.write().await.get_mut(&id.0) {
            mandate.gender = Some(gender);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryResponseRepository {
    answers: RwLock<HashMap<i64, AnswerSet>>,
    completed: RwLock<HashSet<i64>>,
}

impl InMemoryResponseRepository {
    pub async fn is_completed(&self, mandate_id: MandateId) -> bool {
        self.completed.read().await.contains(&mandate_id.0)
    }
}

#[async_trait]
impl ResponseRepository for InMemoryResponseRepository {
    async fn persist_answer(
        &self,
        mandate_id: MandateId,
        answer: &QuestionAnswer,
    ) -> RepositoryResult<()> {
        self.answers
            .write()
            .await
            .entry(mandate_id.0)
            .or_default()
            .put(&answer.question_identifier, &answer.raw_text);
        Ok(())
    }

    async fn answers(&self, mandate_id: MandateId) -> RepositoryResult<AnswerSet> {
        Ok(self.answers.read().await.get(&mandate_id.0).cloned().unwrap_or_default())
    }

    async fn mark_completed(&self, mandate_id: MandateId) -> RepositoryResult<()> {
        self.completed.write().await.insert(mandate_id.0);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProfileDataRepository {
    data: RwLock<HashSet<(i64, String)>>,
}

impl InMemoryProfileDataRepository {
    pub async fn insert(&self, mandate_id: MandateId, question_identifier: &str) {
        self.data.write().await.insert((mandate_id.0, question_identifier.to_owned()));
    }
}

#[async_trait]
impl ProfileDataRepository for InMemoryProfileDataRepository {
    async fn exists(
        &self,
        mandate_id: MandateId,
        question_identifier: &str,
    ) -> RepositoryResult<bool> {
        Ok(self
            .data
            .read()
            .await
            .contains(&(mandate_id.0, question_identifier.to_owned())))
    }

    async fn delete(
        &self,
        mandate_id: MandateId,
        question_identifier: &str,
    ) -> RepositoryResult<()> {
        self.data.write().await.remove(&(mandate_id.0, question_identifier.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEventQueue {
    events: RwLock<Vec<(MandateId, String)>>,
}

impl InMemoryEventQueue {
    pub async fn drained(&self) -> Vec<(MandateId, String)> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventQueue for InMemoryEventQueue {
    async fn enqueue_crm_event(&self, mandate_id: MandateId, event: &str) -> RepositoryResult<()> {
        self.events.write().await.push((mandate_id, event.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOpportunityRepository {
    opportunities: RwLock<HashMap<i64, Opportunity>>,
    next_id: RwLock<i64>,
}

#[async_trait]
impl OpportunityRepository for InMemoryOpportunityRepository {
    async fn find(
        &self,
        mandate_id: MandateId,
        id: OpportunityId,
    ) -> RepositoryResult<Option<Opportunity>> {
        Ok(self
            .opportunities
            .read()
            .await
            .get(&id.0)
            .filter(|opportunity| opportunity.mandate_id == mandate_id)
            .cloned())
    }

    async fn create_opportunity(
        &self,
        mandate_id: MandateId,
        attrs: OpportunityAttrs,
    ) -> RepositoryResult<Opportunity> {
        let mut next_id = self.next_id.write().await;
        *next_id += 1;

        let opportunity = Opportunity {
            id: OpportunityId(*next_id),
            mandate_id,
            category_ident: attrs.category_ident.unwrap_or_default(),
            state: OpportunityState::Created,
            consultant_id: attrs.consultant_id,
        };
        self.opportunities.write().await.insert(opportunity.id.0, opportunity.clone());
        Ok(opportunity)
    }

    async fn update(
        &self,
        mandate_id: MandateId,
        id: OpportunityId,
        attrs: OpportunityAttrs,
    ) -> RepositoryResult<()> {
        let mut opportunities = self.opportunities.write().await;
        let Some(opportunity) = opportunities
            .get_mut(&id.0)
            .filter(|opportunity| opportunity.mandate_id == mandate_id)
        else {
            return Err(RepositoryError::Backend(format!("opportunity {} not found", id.0)));
        };

        if let Some(category_ident) = attrs.category_ident {
            opportunity.category_ident = category_ident;
        }
        if attrs.consultant_id.is_some() {
            opportunity.consultant_id = attrs.consultant_id;
        }
        Ok(())
    }

    async fn accept_offer(
        &self,
        opportunity_id: OpportunityId,
        _product_id: i64,
    ) -> RepositoryResult<()> {
        let mut opportunities = self.opportunities.write().await;
        let Some(opportunity) = opportunities.get_mut(&opportunity_id.0) else {
            return Err(RepositoryError::Backend(format!(
                "opportunity {} not found",
                opportunity_id.0
            )));
        };
        opportunity.state = OpportunityState::OfferPhase;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryClosedOpportunitiesRepository {
    closings: RwLock<HashMap<(i64, NaiveDate), Vec<ClosedOpportunityRecord>>>,
}

impl InMemoryClosedOpportunitiesRepository {
    pub async fn insert(
        &self,
        consultant_id: ConsultantId,
        month: NaiveDate,
        records: Vec<ClosedOpportunityRecord>,
    ) {
        self.closings
            .write()
            .await
            .insert((consultant_id.0, month_of(month)), records);
    }
}

#[async_trait]
impl ClosedOpportunitiesRepository for InMemoryClosedOpportunitiesRepository {
    async fn closed_opportunities_for(
        &self,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
        _category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, Vec<ClosedOpportunityRecord>>> {
        let closings = self.closings.read().await;
        let month = month_of(month);

        Ok(consultant_ids
            .iter()
            .filter_map(|id| {
                closings.get(&(id.0, month)).map(|records| (*id, records.clone()))
            })
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryOpenOpportunitiesCountRepository {
    counts: RwLock<HashMap<i64, OpenLeads>>,
}

impl InMemoryOpenOpportunitiesCountRepository {
    pub async fn insert(&self, consultant_id: ConsultantId, leads: OpenLeads) {
        self.counts.write().await.insert(consultant_id.0, leads);
    }
}

#[async_trait]
impl OpenOpportunitiesCountRepository for InMemoryOpenOpportunitiesCountRepository {
    async fn open_opportunities_count_for(
        &self,
        consultant_ids: &[ConsultantId],
        _category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, OpenLeads>> {
        let counts = self.counts.read().await;
        Ok(consultant_ids
            .iter()
            .filter_map(|id| counts.get(&id.0).map(|leads| (*id, leads.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryMonthlyAdminPerformancesRepository {
    rows: RwLock<Vec<MonthlyAdminPerformance>>,
    next_id: RwLock<i64>,
}

impl InMemoryMonthlyAdminPerformancesRepository {
    pub async fn rows(&self) -> Vec<MonthlyAdminPerformance> {
        self.rows.read().await.clone()
    }

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
impl MonthlyAdminPerformancesRepository for InMemoryMonthlyAdminPerformancesRepository {
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
                            "no monthly performance row with id {}",
                            id.0
                        )))
                    }
                }
            }
            None => {
                // Same contract as the SQL unique key on (consultant,
                // month, algo_version): repeated inserts converge on
                // one row.
                let conflicting = rows.iter_mut().find(|row| {
                    row.consultant_id == record.consultant_id
                        && row.calculation_date == record.calculation_date
                        && row.algo_version == record.algo_version
                });
                match conflicting {
                    Some(row) => {
                        record.id = row.id;
                        *row = record.clone();
                    }
                    None => {
                        let mut next_id = self.next_id.write().await;
                        *next_id += 1;
                        record.id = Some(RecordId(*next_id));
                        rows.push(record.clone());
                    }
                }
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
pub struct InMemorySalesAdminsRepository {
    active: RwLock<Vec<ConsultantId>>,
    permitted: RwLock<HashSet<i64>>,
}

impl InMemorySalesAdminsRepository {
    pub async fn insert(&self, consultant_id: ConsultantId, sales_consultation: bool) {
        self.active.write().await.push(consultant_id);
        if sales_consultation {
            self.permitted.write().await.insert(consultant_id.0);
        }
    }
}

#[async_trait]
impl SalesAdminsRepository for InMemorySalesAdminsRepository {
    async fn sales_consultation_permitted(
        &self,
        consultant_id: ConsultantId,
    ) -> RepositoryResult<bool> {
        Ok(self.permitted.read().await.contains(&consultant_id.0))
    }

    async fn active_sales_consultant_ids(&self) -> RepositoryResult<Vec<ConsultantId>> {
        Ok(self.active.read().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryAoaCategoriesRepository {
    idents: RwLock<Vec<String>>,
}

impl InMemoryAoaCategoriesRepository {
    pub async fn insert(&self, ident: &str) {
        self.idents.write().await.push(ident.to_owned());
    }
}

#[async_trait]
impl AoaCategoriesRepository for InMemoryAoaCategoriesRepository {
    async fn categories_used_in_aoa(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.idents.read().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryClassificationsRepository {
    levels: RwLock<HashMap<i64, BTreeMap<String, String>>>,
}

impl InMemoryClassificationsRepository {
    pub async fn insert(&self, consultant_id: ConsultantId, category_ident: &str, level: &str) {
        self.levels
            .write()
            .await
            .entry(consultant_id.0)
            .or_default()
            .insert(category_ident.to_owned(), level.to_owned());
    }
}

#[async_trait]
impl AdminPerformanceClassificationsRepository for InMemoryClassificationsRepository {
    async fn performance_classifications(
        &self,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, BTreeMap<String, String>>> {
        let levels = self.levels.read().await;
        Ok(consultant_ids
            .iter()
            .filter_map(|id| levels.get(&id.0).map(|map| (*id, map.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use courtier_core::domain::performance::MonthlyAdminPerformance;
    use courtier_core::domain::portfolio::ConsultantId;
    use courtier_core::repositories::{
        MandateRepository, MonthlyAdminPerformancesRepository, OpportunityAttrs,
        OpportunityRepository,
    };
    use courtier_core::{Mandate, MandateId, MandateState, MatrixShape, PerformanceMatrix};

    use super::{
        InMemoryMandateRepository, InMemoryMonthlyAdminPerformancesRepository,
        InMemoryOpportunityRepository,
    };

    fn snapshot(consultant_id: i64, month: NaiveDate) -> MonthlyAdminPerformance {
        MonthlyAdminPerformance {
            id: None,
            consultant_id: ConsultantId(consultant_id),
            calculation_date: month,
            revenue: Decimal::ZERO,
            open_opportunities: 0,
            open_opportunities_category_counts: Default::default(),
            performance_level: Default::default(),
            performance_matrix: PerformanceMatrix::empty(&MatrixShape::default()),
            months_count: 1,
            algo_version: "v2".to_owned(),
        }
    }

    #[tokio::test]
    async fn mandate_round_trip() {
        let repo = InMemoryMandateRepository::default();
        let mandate = Mandate {
            id: MandateId(1),
            state: MandateState::Accepted,
            birthdate: None,
            gender: None,
        };

        repo.insert(mandate.clone()).await;
        let found = repo.find(MandateId(1)).await.expect("find mandate");

        assert_eq!(found, Some(mandate));
    }

    #[tokio::test]
    async fn monthly_performance_save_assigns_ids_and_updates_in_place() {
        let repo = InMemoryMonthlyAdminPerformancesRepository::default();
        let month = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();

        let saved = repo.save(snapshot(1, month), None).await.expect("insert");
        let id = saved.id.expect("id assigned");

        let mut updated = saved.clone();
        updated.open_opportunities = 12;
        repo.save(updated, Some(id)).await.expect("update");

        let rows = repo.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].open_opportunities, 12);
    }

    #[tokio::test]
    async fn monthly_performance_inserts_converge_on_the_unique_key() {
        let repo = InMemoryMonthlyAdminPerformancesRepository::default();
        let month = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();

        let first = repo.save(snapshot(1, month), None).await.expect("first insert");
        let mut replacement = snapshot(1, month);
        replacement.open_opportunities = 7;
        let second = repo.save(replacement, None).await.expect("conflicting insert");

        assert_eq!(second.id, first.id, "conflict resolves onto the existing row");
        let rows = repo.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].open_opportunities, 7);
    }

    #[tokio::test]
    async fn latest_before_excludes_the_queried_month() {
        let repo = InMemoryMonthlyAdminPerformancesRepository::default();
        let april = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let may = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();

        repo.save(snapshot(1, april), None).await.expect("april");
        repo.save(snapshot(1, may), None).await.expect("may");

        let latest = repo
            .latest_before("v2", may, &[ConsultantId(1)])
            .await
            .expect("latest_before");

        assert_eq!(latest[&ConsultantId(1)].calculation_date, april);
    }

    #[tokio::test]
    async fn opportunity_create_and_update() {
        let repo = InMemoryOpportunityRepository::default();

        let created = repo
            .create_opportunity(
                MandateId(5),
                OpportunityAttrs {
                    category_ident: Some("bu".to_owned()),
                    consultant_id: None,
                },
            )
            .await
            .expect("create");

        repo.update(
            MandateId(5),
            created.id,
            OpportunityAttrs {
                category_ident: None,
                consultant_id: Some(ConsultantId(9)),
            },
        )
        .await
        .expect("update");

        let found = repo.find(MandateId(5), created.id).await.expect("find").expect("present");
        assert_eq!(found.category_ident, "bu");
        assert_eq!(found.consultant_id, Some(ConsultantId(9)));
    }
}
