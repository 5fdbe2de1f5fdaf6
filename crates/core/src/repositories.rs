//! Port traits the engines call. Adapters live in `courtier-db`; tests
//! bring their own doubles.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::mandate::{Gender, Mandate, MandateId};
use crate::domain::performance::{
    ClosedOpportunityRecord, MonthlyAdminPerformance, OpenLeads, RecordId,
};
use crate::domain::portfolio::{ConsultantId, Opportunity, OpportunityId};
use crate::domain::questionnaire::{AnswerSet, QuestionAnswer};
use crate::errors::RepositoryError;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait MandateRepository: Send + Sync {
    async fn find(&self, id: MandateId) -> RepositoryResult<Option<Mandate>>;
    async fn update_birthdate(&self, id: MandateId, birthdate: NaiveDate) -> RepositoryResult<()>;
    async fn update_gender(&self, id: MandateId, gender: Gender) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ResponseRepository: Send + Sync {
    async fn persist_answer(
        &self,
        mandate_id: MandateId,
        answer: &QuestionAnswer,
    ) -> RepositoryResult<()>;

    async fn answers(&self, mandate_id: MandateId) -> RepositoryResult<AnswerSet>;

    async fn mark_completed(&self, mandate_id: MandateId) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ProfileDataRepository: Send + Sync {
    async fn exists(
        &self,
        mandate_id: MandateId,
        question_identifier: &str,
    ) -> RepositoryResult<bool>;

    async fn delete(
        &self,
        mandate_id: MandateId,
        question_identifier: &str,
    ) -> RepositoryResult<()>;
}

/// Background-job boundary. Enqueue is fire-and-forget; the core never
/// awaits job results.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn enqueue_crm_event(&self, mandate_id: MandateId, event: &str) -> RepositoryResult<()>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OpportunityAttrs {
    pub category_ident: Option<String>,
    pub consultant_id: Option<ConsultantId>,
}

#[async_trait]
pub trait OpportunityRepository: Send + Sync {
    async fn find(
        &self,
        mandate_id: MandateId,
        id: OpportunityId,
    ) -> RepositoryResult<Option<Opportunity>>;

    async fn create_opportunity(
        &self,
        mandate_id: MandateId,
        attrs: OpportunityAttrs,
    ) -> RepositoryResult<Opportunity>;

    async fn update(
        &self,
        mandate_id: MandateId,
        id: OpportunityId,
        attrs: OpportunityAttrs,
    ) -> RepositoryResult<()>;

    async fn accept_offer(
        &self,
        opportunity_id: OpportunityId,
        product_id: i64,
    ) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ClosedOpportunitiesRepository: Send + Sync {
    /// Closed opportunities in the month of `month` per consultant.
    /// Consultants without any closing are absent from the map.
    async fn closed_opportunities_for(
        &self,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, Vec<ClosedOpportunityRecord>>>;
}

#[async_trait]
pub trait OpenOpportunitiesCountRepository: Send + Sync {
    async fn open_opportunities_count_for(
        &self,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, OpenLeads>>;
}

#[async_trait]
pub trait MonthlyAdminPerformancesRepository: Send + Sync {
    /// Latest persisted snapshot strictly before `month` — the rolling
    /// average input. Re-running a month never rolls it into itself.
    async fn latest_before(
        &self,
        algo_version: &str,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>>;

    /// Snapshot persisted for exactly `month`, if any — the upsert key.
    async fn find_for_month(
        &self,
        algo_version: &str,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>>;

    async fn latest_for(
        &self,
        algo_version: &str,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, MonthlyAdminPerformance>>;

    /// Insert when `existing_id` is `None`, update that row otherwise.
    /// Storage guarantees at most one row per (consultant, month,
    /// algo_version).
    async fn save(
        &self,
        record: MonthlyAdminPerformance,
        existing_id: Option<RecordId>,
    ) -> RepositoryResult<MonthlyAdminPerformance>;

    async fn delete(&self, ids: &[RecordId]) -> RepositoryResult<()>;
}

#[async_trait]
pub trait SalesAdminsRepository: Send + Sync {
    async fn sales_consultation_permitted(
        &self,
        consultant_id: ConsultantId,
    ) -> RepositoryResult<bool>;

    async fn active_sales_consultant_ids(&self) -> RepositoryResult<Vec<ConsultantId>>;
}

#[async_trait]
pub trait AoaCategoriesRepository: Send + Sync {
    async fn categories_used_in_aoa(&self) -> RepositoryResult<Vec<String>>;
}

#[async_trait]
pub trait AdminPerformanceClassificationsRepository: Send + Sync {
    async fn performance_classifications(
        &self,
        consultant_ids: &[ConsultantId],
    ) -> RepositoryResult<HashMap<ConsultantId, BTreeMap<String, String>>>;
}
