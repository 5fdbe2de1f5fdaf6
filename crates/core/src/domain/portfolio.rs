//! The mandate's current per-category holdings: inquiries in flight,
//! products under management, and open sales opportunities. The demand
//! check only ever asks one question of them: is there anything ACTIVE
//! for a category, or are all instances terminal?

use serde::{Deserialize, Serialize};

use crate::domain::mandate::MandateId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpportunityId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsultantId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryState {
    Pending,
    Contacted,
    Completed,
    Canceled,
}

impl InquiryState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Completed | Self::Canceled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductState {
    Offered,
    Ordered,
    UnderManagement,
    Terminated,
    Canceled,
}

impl ProductState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Terminated | Self::Canceled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityState {
    Created,
    InitiationPhase,
    OfferPhase,
    Completed,
    Lost,
}

impl OpportunityState {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Completed | Self::Lost)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InitiationPhase => "initiation_phase",
            Self::OfferPhase => "offer_phase",
            Self::Completed => "completed",
            Self::Lost => "lost",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(Self::Created),
            "initiation_phase" => Some(Self::InitiationPhase),
            "offer_phase" => Some(Self::OfferPhase),
            "completed" => Some(Self::Completed),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

/// A sales pipeline entry for one category of one mandate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub mandate_id: MandateId,
    pub category_ident: String,
    pub state: OpportunityState,
    pub consultant_id: Option<ConsultantId>,
}

/// One category instance of any kind, reduced to what the demand check
/// needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CategoryInstance {
    Inquiry { category_ident: String, state: InquiryState },
    Product { category_ident: String, state: ProductState },
    Opportunity { category_ident: String, state: OpportunityState },
}

impl CategoryInstance {
    pub fn category_ident(&self) -> &str {
        match self {
            Self::Inquiry { category_ident, .. }
            | Self::Product { category_ident, .. }
            | Self::Opportunity { category_ident, .. } => category_ident,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Self::Inquiry { state, .. } => state.is_active(),
            Self::Product { state, .. } => state.is_active(),
            Self::Opportunity { state, .. } => state.is_active(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub instances: Vec<CategoryInstance>,
}

impl Portfolio {
    pub fn new(instances: Vec<CategoryInstance>) -> Self {
        Self { instances }
    }

    pub fn has_active(&self, category_ident: &str) -> bool {
        self.instances
            .iter()
            .any(|instance| instance.category_ident() == category_ident && instance.is_active())
    }

    pub fn has_any(&self, category_ident: &str) -> bool {
        self.instances.iter().any(|instance| instance.category_ident() == category_ident)
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryInstance, InquiryState, OpportunityState, Portfolio, ProductState};

    #[test]
    fn terminal_states_are_inactive() {
        assert!(!InquiryState::Canceled.is_active());
        assert!(!ProductState::Terminated.is_active());
        assert!(!OpportunityState::Lost.is_active());
        assert!(InquiryState::Pending.is_active());
        assert!(ProductState::UnderManagement.is_active());
        assert!(OpportunityState::OfferPhase.is_active());
    }

    #[test]
    fn portfolio_distinguishes_active_from_stale_instances() {
        let portfolio = Portfolio::new(vec![
            CategoryInstance::Inquiry {
                category_ident: "kfz".to_owned(),
                state: InquiryState::Canceled,
            },
            CategoryInstance::Opportunity {
                category_ident: "phv".to_owned(),
                state: OpportunityState::OfferPhase,
            },
        ]);

        assert!(portfolio.has_any("kfz"));
        assert!(!portfolio.has_active("kfz"));
        assert!(portfolio.has_active("phv"));
        assert!(!portfolio.has_any("bu"));
    }
}
