pub mod config;
pub mod demand;
pub mod domain;
pub mod errors;
pub mod repositories;
pub mod sales;

pub use config::{AppConfig, AoaConfig, ConfigError, DemandConfig, LoadOptions, LogFormat};
pub use demand::{
    AnswersValidator, DemandContext, MandatoryRecommendations, RecommendationsBuilder,
    ResponseBuilder, RuleSet,
};
pub use domain::advice::SwitcherAdvice;
pub use domain::category::{Category, CategoryCatalog, CategoryType};
pub use domain::mandate::{Gender, Mandate, MandateId, MandateState};
pub use domain::performance::{
    ClosedOpportunityRecord, MatrixShape, MonthlyAdminPerformance, OpenLeads, PerformanceLevel,
    PerformanceMatrix, RecordId,
};
pub use domain::portfolio::{
    CategoryInstance, ConsultantId, InquiryState, Opportunity, OpportunityId, OpportunityState,
    Portfolio, ProductState,
};
pub use domain::questionnaire::{AnswerSet, QuestionAnswer};
pub use domain::recommendation::{Recommendation, RecommendationLevel};
pub use errors::{ApplicationError, DomainError, RepositoryError, ValidationFailure};
pub use sales::{
    CalculateMonthlyPerformanceMatrix, CalculateOpenLeadsCount, CalculatePerformanceMatrix,
    CalculateRevenue, GenerateHistoricalMonthlyAdminPerformance, PerformanceSettings,
    PopulateMonthlyAdminPerformance, RollingInput, UpdateConsultantPerformanceLevel,
};
