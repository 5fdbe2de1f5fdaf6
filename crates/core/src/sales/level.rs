//! Manual override of a consultant's performance classification on the
//! latest monthly snapshot.

use std::sync::Arc;

use crate::domain::performance::{MonthlyAdminPerformance, PerformanceLevel};
use crate::domain::portfolio::ConsultantId;
use crate::errors::ApplicationError;
use crate::repositories::MonthlyAdminPerformancesRepository;

pub struct UpdateConsultantPerformanceLevel {
    performances: Arc<dyn MonthlyAdminPerformancesRepository>,
    algo_version: String,
}

impl UpdateConsultantPerformanceLevel {
    pub fn new(
        performances: Arc<dyn MonthlyAdminPerformancesRepository>,
        algo_version: &str,
    ) -> Self {
        Self { performances, algo_version: algo_version.to_owned() }
    }

    pub async fn call(
        &self,
        consultant_id: ConsultantId,
        category_ident: &str,
        level: PerformanceLevel,
    ) -> Result<MonthlyAdminPerformance, ApplicationError> {
        let mut latest =
            self.performances.latest_for(&self.algo_version, &[consultant_id]).await?;

        let Some(mut record) = latest.remove(&consultant_id) else {
            return Err(ApplicationError::not_found("monthly performance", consultant_id.0));
        };

        record
            .performance_level
            .insert(category_ident.to_owned(), level.as_str().to_owned());

        let existing_id = record.id;
        Ok(self.performances.save(record, existing_id).await?)
    }
}
