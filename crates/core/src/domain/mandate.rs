use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MandateId(pub i64);

/// Customer lifecycle as the brokerage sees it. Only `Accepted` mandates
/// may emit CRM events on questionnaire completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MandateState {
    InCreation,
    Created,
    Accepted,
    Revoked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Accepts both the questionnaire salutation values and the already
    /// normalized forms.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "herr" | "male" | "mann" => Some(Self::Male),
            "frau" | "female" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mandate {
    pub id: MandateId,
    pub state: MandateState,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl Mandate {
    /// Whole years completed as of `today`. `None` without a birthdate;
    /// a birthdate in the future counts as age 0.
    pub fn age_at(&self, today: NaiveDate) -> Option<u32> {
        let birthdate = self.birthdate?;
        Some(today.years_since(birthdate).unwrap_or(0))
    }
}
