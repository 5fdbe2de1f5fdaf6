//! SQL adapters over the opportunities table: pipeline CRUD, the
//! closed-opportunity aggregation input and the open-pipeline counts.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use sqlx::Row;

use courtier_core::domain::performance::{ClosedOpportunityRecord, OpenLeads};
use courtier_core::domain::portfolio::{
    ConsultantId, Opportunity, OpportunityId, OpportunityState,
};
use courtier_core::repositories::{
    ClosedOpportunitiesRepository, OpenOpportunitiesCountRepository, OpportunityAttrs,
    OpportunityRepository, RepositoryResult,
};
use courtier_core::{MandateId, RepositoryError};

use super::{backend, decode};
use crate::DbPool;

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn month_bounds(month: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = month.with_day(1).unwrap_or(month);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
    (start, end)
}

pub struct SqlOpportunityRepository {
    pool: DbPool,
}

impl SqlOpportunityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpportunityRepository for SqlOpportunityRepository {
    async fn find(
        &self,
        mandate_id: MandateId,
        id: OpportunityId,
    ) -> RepositoryResult<Option<Opportunity>> {
        let row = sqlx::query(
            "SELECT id, mandate_id, category_ident, state, consultant_id \
             FROM opportunities WHERE id = ? AND mandate_id = ?",
        )
        .bind(id.0)
        .bind(mandate_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else { return Ok(None) };

        let state: String = row.try_get("state").map_err(backend)?;
        Ok(Some(Opportunity {
            id: OpportunityId(row.try_get("id").map_err(backend)?),
            mandate_id: MandateId(row.try_get("mandate_id").map_err(backend)?),
            category_ident: row.try_get("category_ident").map_err(backend)?,
            state: OpportunityState::parse(&state)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown state `{state}`")))?,
            consultant_id: row
                .try_get::<Option<i64>, _>("consultant_id")
                .map_err(backend)?
                .map(ConsultantId),
        }))
    }

    async fn create_opportunity(
        &self,
        mandate_id: MandateId,
        attrs: OpportunityAttrs,
    ) -> RepositoryResult<Opportunity> {
        let category_ident = attrs.category_ident.unwrap_or_default();
        let row = sqlx::query(
            "INSERT INTO opportunities (mandate_id, category_ident, state, consultant_id) \
             VALUES (?, ?, 'created', ?) RETURNING id",
        )
        .bind(mandate_id.0)
        .bind(&category_ident)
        .bind(attrs.consultant_id.map(|id| id.0))
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Opportunity {
            id: OpportunityId(row.try_get("id").map_err(backend)?),
            mandate_id,
            category_ident,
            state: OpportunityState::Created,
            consultant_id: attrs.consultant_id,
        })
    }

    async fn update(
        &self,
        mandate_id: MandateId,
        id: OpportunityId,
        attrs: OpportunityAttrs,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE opportunities SET \
             category_ident = COALESCE(?, category_ident), \
             consultant_id = COALESCE(?, consultant_id) \
             WHERE id = ? AND mandate_id = ?",
        )
        .bind(attrs.category_ident)
        .bind(attrs.consultant_id.map(|consultant| consultant.0))
        .bind(id.0)
        .bind(mandate_id.0)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!("opportunity {} not found", id.0)));
        }
        Ok(())
    }

    async fn accept_offer(
        &self,
        opportunity_id: OpportunityId,
        product_id: i64,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE opportunities SET state = 'offer_phase', accepted_product_id = ? \
             WHERE id = ?",
        )
        .bind(product_id)
        .bind(opportunity_id.0)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Backend(format!(
                "opportunity {} not found",
                opportunity_id.0
            )));
        }
        Ok(())
    }
}

pub struct SqlClosedOpportunitiesRepository {
    pool: DbPool,
}

impl SqlClosedOpportunitiesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClosedOpportunitiesRepository for SqlClosedOpportunitiesRepository {
    async fn closed_opportunities_for(
        &self,
        month: NaiveDate,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, Vec<ClosedOpportunityRecord>>> {
        if consultant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let (start, end) = month_bounds(month);
        let mut sql = format!(
            "SELECT consultant_id, closed_successfully, avg_open_opportunities, \
             generated_revenue_so_far FROM opportunities \
             WHERE state IN ('completed', 'lost') \
             AND closed_at >= ? AND closed_at < ? \
             AND consultant_id IN ({})",
            placeholders(consultant_ids.len())
        );
        if !category_idents.is_empty() {
            sql.push_str(&format!(
                " AND category_ident IN ({})",
                placeholders(category_idents.len())
            ));
        }

        let mut query = sqlx::query(&sql).bind(start).bind(end);
        for consultant_id in consultant_ids {
            query = query.bind(consultant_id.0);
        }
        for ident in category_idents {
            query = query.bind(ident);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;

        let mut closings: HashMap<ConsultantId, Vec<ClosedOpportunityRecord>> = HashMap::new();
        for row in rows {
            let consultant_id = ConsultantId(row.try_get("consultant_id").map_err(backend)?);
            let revenue: Option<String> =
                row.try_get("generated_revenue_so_far").map_err(backend)?;
            let revenue = match revenue {
                Some(raw) => Decimal::from_str(&raw).map_err(decode)?,
                None => Decimal::ZERO,
            };

            closings.entry(consultant_id).or_default().push(ClosedOpportunityRecord {
                closed_successfully: row
                    .try_get::<Option<bool>, _>("closed_successfully")
                    .map_err(backend)?
                    .unwrap_or(false),
                avg_open_opportunities: row
                    .try_get::<Option<f64>, _>("avg_open_opportunities")
                    .map_err(backend)?
                    .unwrap_or(0.0),
                generated_revenue_so_far: revenue,
            });
        }

        Ok(closings)
    }
}

pub struct SqlOpenOpportunitiesCountRepository {
    pool: DbPool,
}

impl SqlOpenOpportunitiesCountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OpenOpportunitiesCountRepository for SqlOpenOpportunitiesCountRepository {
    async fn open_opportunities_count_for(
        &self,
        consultant_ids: &[ConsultantId],
        category_idents: &[String],
    ) -> RepositoryResult<HashMap<ConsultantId, OpenLeads>> {
        if consultant_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut sql = format!(
            "SELECT consultant_id, category_ident, COUNT(*) AS open_count \
             FROM opportunities \
             WHERE state NOT IN ('completed', 'lost') \
             AND consultant_id IN ({})",
            placeholders(consultant_ids.len())
        );
        if !category_idents.is_empty() {
            sql.push_str(&format!(
                " AND category_ident IN ({})",
                placeholders(category_idents.len())
            ));
        }
        sql.push_str(" GROUP BY consultant_id, category_ident");

        let mut query = sqlx::query(&sql);
        for consultant_id in consultant_ids {
            query = query.bind(consultant_id.0);
        }
        for ident in category_idents {
            query = query.bind(ident);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;

        let mut counts: HashMap<ConsultantId, OpenLeads> = HashMap::new();
        for row in rows {
            let consultant_id = ConsultantId(row.try_get("consultant_id").map_err(backend)?);
            let category_ident: String = row.try_get("category_ident").map_err(backend)?;
            let open_count: i64 = row.try_get("open_count").map_err(backend)?;

            let leads = counts.entry(consultant_id).or_default();
            leads.open_opportunities += open_count;
            leads.open_opportunities_category_counts.insert(category_ident, open_count);
        }

        Ok(counts)
    }
}
