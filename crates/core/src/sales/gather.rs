//! Month inputs for the snapshot: closed revenue and open-pipeline
//! counts. Both filter on the `sales_consultation` permission BEFORE
//! touching the counting repositories, so a fully unpermitted batch
//! performs no counting I/O at all.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::performance::OpenLeads;
use crate::domain::portfolio::ConsultantId;
use crate::errors::ApplicationError;
use crate::repositories::{
    ClosedOpportunitiesRepository, OpenOpportunitiesCountRepository, SalesAdminsRepository,
};

pub(crate) async fn filter_permitted(
    admins: &dyn SalesAdminsRepository,
    consultant_ids: &[ConsultantId],
) -> Result<Vec<ConsultantId>, ApplicationError> {
    let mut permitted = Vec::with_capacity(consultant_ids.len());
    for consultant_id in consultant_ids {
        if admins.sales_consultation_permitted(*consultant_id).await? {
            permitted.push(*consultant_id);
        }
    }
    Ok(permitted)
}

pub struct CalculateRevenue {
    admins: Arc<dyn SalesAdminsRepository>,
    closed_opportunities: Arc<dyn ClosedOpportunitiesRepository>,
}

impl CalculateRevenue {
    pub fn new(
        admins: Arc<dyn SalesAdminsRepository>,
        closed_opportunities: Arc<dyn ClosedOpportunitiesRepository>,
    ) -> Self {
        Self { admins, closed_opportunities }
    }

    /// Revenue generated by each permitted consultant's closings in the
    /// month. Permitted consultants without closings map to zero.
    pub async fn call(
        &self,
        beginning_of_month: NaiveDate,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> Result<HashMap<ConsultantId, Decimal>, ApplicationError> {
        let permitted = filter_permitted(self.admins.as_ref(), consultant_ids).await?;
        if permitted.is_empty() {
            return Ok(HashMap::new());
        }

        let closings = self
            .closed_opportunities
            .closed_opportunities_for(beginning_of_month, &permitted, category_idents)
            .await?;

        let mut revenue = HashMap::with_capacity(permitted.len());
        for consultant_id in permitted {
            let total = closings
                .get(&consultant_id)
                .map(|records| {
                    records.iter().map(|record| record.generated_revenue_so_far).sum()
                })
                .unwrap_or(Decimal::ZERO);
            revenue.insert(consultant_id, total);
        }

        Ok(revenue)
    }
}

pub struct CalculateOpenLeadsCount {
    admins: Arc<dyn SalesAdminsRepository>,
    open_counts: Arc<dyn OpenOpportunitiesCountRepository>,
}

impl CalculateOpenLeadsCount {
    pub fn new(
        admins: Arc<dyn SalesAdminsRepository>,
        open_counts: Arc<dyn OpenOpportunitiesCountRepository>,
    ) -> Self {
        Self { admins, open_counts }
    }

    pub async fn call(
        &self,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> Result<HashMap<ConsultantId, OpenLeads>, ApplicationError> {
        let permitted = filter_permitted(self.admins.as_ref(), consultant_ids).await?;
        if permitted.is_empty() {
            return Ok(HashMap::new());
        }

        let counted =
            self.open_counts.open_opportunities_count_for(&permitted, category_idents).await?;

        let mut leads = HashMap::with_capacity(permitted.len());
        for consultant_id in permitted {
            leads.insert(
                consultant_id,
                counted.get(&consultant_id).cloned().unwrap_or_default(),
            );
        }

        Ok(leads)
    }
}
