//! Consultant allocation for incoming opportunities: deterministic A/B
//! cohort split, ranking-service call for the treatment group, and the
//! control-group degradation every failure path lands in.

use std::sync::Arc;

use tracing::warn;

use courtier_core::config::AoaConfig;
use courtier_core::repositories::{MonthlyAdminPerformancesRepository, SalesAdminsRepository};
use courtier_core::{ApplicationError, ConsultantId, Opportunity, OpportunityId};

use super::client::{AoaRankingApi, AoaRankResult, ConsultantMatrix};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cohort {
    AoaGroup,
    ControlGroup,
}

impl Cohort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AoaGroup => "aoa_group",
            Self::ControlGroup => "control_group",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AoaResponseData {
    pub aoa_errors: Vec<String>,
    pub aoa_consultant_ids: Vec<ConsultantId>,
    pub cohort: Cohort,
    pub request_uuid: Option<String>,
}

/// What the opportunity screen needs: the consultant dropdown plus the
/// allocation telemetry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AoaData {
    pub admins_for_select: Vec<ConsultantId>,
    pub response: AoaResponseData,
}

/// Stable A/B split: the opportunity id hashes into a percentile bucket
/// compared against the configured treatment share. The same
/// opportunity always lands in the same cohort.
pub fn in_treatment_group(opportunity_id: OpportunityId, test_group_percent: u8) -> bool {
    let digest = blake3::hash(&opportunity_id.0.to_le_bytes());
    let bucket = digest.as_bytes()[..8]
        .try_into()
        .map(u64::from_le_bytes)
        .unwrap_or(0)
        % 100;

    bucket < u64::from(test_group_percent)
}

pub struct BuildAoaData {
    ranking: Arc<dyn AoaRankingApi>,
    admins: Arc<dyn SalesAdminsRepository>,
    performances: Arc<dyn MonthlyAdminPerformancesRepository>,
    config: AoaConfig,
}

impl BuildAoaData {
    pub fn new(
        ranking: Arc<dyn AoaRankingApi>,
        admins: Arc<dyn SalesAdminsRepository>,
        performances: Arc<dyn MonthlyAdminPerformancesRepository>,
        config: AoaConfig,
    ) -> Self {
        Self { ranking, admins, performances, config }
    }

    /// Never hard-fails on the ranking side: any AOA error degrades to
    /// the control group with the full active roster. Only the roster
    /// lookup itself can error, since without it there is nothing to
    /// offer at all.
    pub async fn call(&self, opportunity: &Opportunity) -> Result<AoaData, ApplicationError> {
        let roster = self.admins.active_sales_consultant_ids().await?;

        if !self.eligible(opportunity)
            || !in_treatment_group(opportunity.id, self.config.test_group_percent)
        {
            return Ok(control_group(roster, Vec::new(), None));
        }

        match self.request_allocation(opportunity, &roster).await {
            Ok(result) => {
                let allocated = self.filter_permitted(&result.aoa_ranks).await;

                if result.successful && !allocated.is_empty() {
                    Ok(AoaData {
                        admins_for_select: allocated.clone(),
                        response: AoaResponseData {
                            aoa_errors: result.errors,
                            aoa_consultant_ids: allocated,
                            cohort: Cohort::AoaGroup,
                            request_uuid: result.request_uuid,
                        },
                    })
                } else {
                    Ok(control_group(roster, result.errors, result.request_uuid))
                }
            }
            Err(error) => {
                warn!(
                    opportunity_id = opportunity.id.0,
                    %error,
                    "aoa allocation degraded to control group"
                );
                Ok(control_group(roster, vec![error.to_string()], None))
            }
        }
    }

    fn eligible(&self, opportunity: &Opportunity) -> bool {
        opportunity.category_ident == self.config.bu_category_ident
            && opportunity.consultant_id.is_none()
    }

    async fn request_allocation(
        &self,
        opportunity: &Opportunity,
        roster: &[ConsultantId],
    ) -> Result<AoaRankResult, ApplicationError> {
        let matrices =
            self.performances.latest_for(&self.config.algo_version, roster).await?;

        let consultants: Vec<ConsultantMatrix> = matrices
            .into_iter()
            .map(|(consultant_id, record)| ConsultantMatrix {
                consultant_id: consultant_id.0,
                performance_matrix: record.performance_matrix,
            })
            .collect();

        if consultants.is_empty() {
            return Err(ApplicationError::ExternalService(
                "no performance matrices available for ranking".to_owned(),
            ));
        }

        Ok(self.ranking.request_ranks(&opportunity.category_ident, &consultants).await)
    }

    /// Ranks coming back from the service are only offered when the
    /// consultant still holds sales-consultation access right now.
    async fn filter_permitted(&self, ranks: &[ConsultantId]) -> Vec<ConsultantId> {
        let mut permitted = Vec::with_capacity(ranks.len());
        for consultant_id in ranks {
            match self.admins.sales_consultation_permitted(*consultant_id).await {
                Ok(true) => permitted.push(*consultant_id),
                Ok(false) => {}
                Err(error) => {
                    warn!(consultant_id = consultant_id.0, %error, "permission check failed");
                }
            }
        }
        permitted
    }
}

fn control_group(
    roster: Vec<ConsultantId>,
    aoa_errors: Vec<String>,
    request_uuid: Option<String>,
) -> AoaData {
    AoaData {
        admins_for_select: roster,
        response: AoaResponseData {
            aoa_errors,
            aoa_consultant_ids: Vec::new(),
            cohort: Cohort::ControlGroup,
            request_uuid,
        },
    }
}
