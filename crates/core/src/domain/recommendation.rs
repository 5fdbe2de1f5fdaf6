use serde::{Deserialize, Serialize};

use crate::domain::mandate::MandateId;

/// Priority a recommendation is surfaced with. `Dismissed` entries are
/// kept as placeholders so the advice screen can explain why a category
/// is intentionally not offered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationLevel {
    Dismissed,
    Recommended,
    Important,
}

impl RecommendationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dismissed => "dismissed",
            Self::Recommended => "recommended",
            Self::Important => "important",
        }
    }
}

/// A suggested insurance category for a mandate. At most one per
/// (mandate, category); the builder's working set enforces it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub mandate_id: MandateId,
    pub category_ident: String,
    pub level: RecommendationLevel,
    pub is_mandatory: bool,
}

impl Recommendation {
    pub fn new(mandate_id: MandateId, category_ident: &str, level: RecommendationLevel) -> Self {
        Self {
            mandate_id,
            category_ident: category_ident.to_owned(),
            level,
            is_mandatory: false,
        }
    }
}
