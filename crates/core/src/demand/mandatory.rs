//! Mandatory ("address now") flags on recommendations.
//!
//! A category becomes mandatory when an answer implies the customer
//! already carries the underlying risk AND nothing active is handling
//! it. Stale terminal instances keep the flag on so the customer is
//! re-engaged; anything active forces it off.

use crate::domain::category::idents;
use crate::domain::portfolio::Portfolio;
use crate::domain::questionnaire::{questions, AnswerSet};
use crate::domain::recommendation::Recommendation;

use super::rules::AnswerMatcher;

#[derive(Clone, Copy, Debug)]
struct MandatoryRule {
    category: &'static str,
    question: &'static str,
    matcher: AnswerMatcher,
}

const MANDATORY_RULES: &[MandatoryRule] = &[
    MandatoryRule {
        category: idents::KFZ,
        question: questions::VEHICLE,
        matcher: AnswerMatcher::AnySelected(&["Auto", "Motorrad"]),
    },
    MandatoryRule {
        category: idents::TIERHALTERHAFTPFLICHT,
        question: questions::PETS,
        matcher: AnswerMatcher::AnySelected(&["Hund", "Pferd"]),
    },
    MandatoryRule {
        category: idents::GKV,
        question: questions::HEALTH_INSURANCE,
        matcher: AnswerMatcher::Equals("gesetzlich"),
    },
    MandatoryRule {
        category: idents::PKV,
        question: questions::HEALTH_INSURANCE,
        matcher: AnswerMatcher::Equals("privat"),
    },
];

pub struct MandatoryRecommendations<'a> {
    answers: &'a AnswerSet,
    portfolio: &'a Portfolio,
}

impl<'a> MandatoryRecommendations<'a> {
    pub fn new(answers: &'a AnswerSet, portfolio: &'a Portfolio) -> Self {
        Self { answers, portfolio }
    }

    /// Whether the answers imply mandatory status for `category_ident`
    /// and no active instance is already handling it.
    pub fn implied(&self, category_ident: &str) -> bool {
        let implied_by_answer = MANDATORY_RULES.iter().any(|rule| {
            rule.category == category_ident && rule.matcher.matches(self.answers, rule.question)
        });

        implied_by_answer && !self.portfolio.has_active(category_ident)
    }

    /// Mutates `is_mandatory` in place across the working set.
    pub fn apply(&self, recommendations: &mut [Recommendation]) {
        for recommendation in recommendations {
            recommendation.is_mandatory = self.implied(&recommendation.category_ident);
        }
    }
}
