use thiserror::Error;

use crate::domain::portfolio::ConsultantId;

/// One rejected questionnaire answer. Reported back to the caller so the
/// customer can be re-prompted; never raised past the response flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    pub question_identifier: String,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(question_identifier: &str, reason: &str) -> Self {
        Self { question_identifier: question_identifier.to_owned(), reason: reason.to_owned() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("answer validation failed for {} question(s)", .failures.len())]
    InvalidAnswers { failures: Vec<ValidationFailure> },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(code: &str) -> Self {
        Self::Validation(code.to_owned())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("repository backend error: {0}")]
    Backend(String),
    #[error("repository decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("external service failure: {0}")]
    ExternalService(String),
    #[error("performance computation failed for consultant {consultant_id}: {message}")]
    Computation { consultant_id: i64, message: String },
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn computation(consultant_id: ConsultantId, source: &ApplicationError) -> Self {
        Self::Computation { consultant_id: consultant_id.0, message: source.to_string() }
    }

    /// External-service and not-found conditions are degradations the
    /// calling flow absorbs; everything else is a hard fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Domain(_) | Self::NotFound { .. } | Self::ExternalService(_)
        )
    }
}
