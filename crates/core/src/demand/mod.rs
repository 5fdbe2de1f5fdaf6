//! Demand-check engine: answer validation, response handling and the
//! recommendation rule evaluation.

mod answers;
mod builder;
mod mandatory;
mod response;
mod rules;

pub use answers::{parse_answer_amount, parse_answer_date, AnswersValidator};
pub use builder::{DemandContext, RecommendationsBuilder};
pub use mandatory::MandatoryRecommendations;
pub use response::{ResponseBuilder, QUESTIONNAIRE_COMPLETED_EVENT};
pub use rules::{
    find_occupation, AnswerMatcher, JobRule, Occupation, OccupationCondition,
    RecommendationRule, RuleSet, JOB_RULES, OCCUPATIONS, RECOMMENDATION_RULES,
    STATUTORY_INSURANCE_INCOME_THRESHOLD,
};
