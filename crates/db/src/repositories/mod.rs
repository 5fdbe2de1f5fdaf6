use courtier_core::errors::RepositoryError;

pub mod admins;
pub mod memory;
pub mod opportunity;
pub mod performance;

pub use admins::{SqlAoaCategoriesRepository, SqlSalesAdminsRepository};
pub use memory::{
    InMemoryAoaCategoriesRepository, InMemoryClassificationsRepository,
    InMemoryClosedOpportunitiesRepository, InMemoryEventQueue, InMemoryMandateRepository,
    InMemoryMonthlyAdminPerformancesRepository, InMemoryOpenOpportunitiesCountRepository,
    InMemoryOpportunityRepository, InMemoryProfileDataRepository, InMemoryResponseRepository,
    InMemorySalesAdminsRepository,
};
pub use opportunity::{
    SqlClosedOpportunitiesRepository, SqlOpenOpportunitiesCountRepository,
    SqlOpportunityRepository,
};
pub use performance::{
    SqlAdminPerformanceClassificationsRepository, SqlMonthlyAdminPerformancesRepository,
};

pub(crate) fn backend(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(error.to_string())
}

pub(crate) fn decode(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
