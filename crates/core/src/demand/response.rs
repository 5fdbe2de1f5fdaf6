//! Persists questionnaire answers and finalizes the response: answer
//! validation, mandate field sync, profile-data retraction cleanup and
//! the completion event for accepted mandates.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::mandate::{Gender, MandateId, MandateState};
use crate::domain::questionnaire::{questions, QuestionAnswer};
use crate::errors::{ApplicationError, DomainError, ValidationFailure};
use crate::repositories::{
    EventQueue, MandateRepository, ProfileDataRepository, ResponseRepository,
};

use super::answers::{parse_answer_date, AnswersValidator};

pub const QUESTIONNAIRE_COMPLETED_EVENT: &str = "questionnaire_completed";

pub struct ResponseBuilder {
    mandate_id: MandateId,
    mandates: Arc<dyn MandateRepository>,
    responses: Arc<dyn ResponseRepository>,
    profile_data: Arc<dyn ProfileDataRepository>,
    events: Arc<dyn EventQueue>,
    crm_events_enabled: bool,
    today: NaiveDate,
}

impl ResponseBuilder {
    pub fn new(
        mandate_id: MandateId,
        mandates: Arc<dyn MandateRepository>,
        responses: Arc<dyn ResponseRepository>,
        profile_data: Arc<dyn ProfileDataRepository>,
        events: Arc<dyn EventQueue>,
        crm_events_enabled: bool,
        today: NaiveDate,
    ) -> Self {
        Self {
            mandate_id,
            mandates,
            responses,
            profile_data,
            events,
            crm_events_enabled,
            today,
        }
    }

    /// Validates and persists a batch of answers. Invalid answers are
    /// collected and reported; the valid remainder is persisted either
    /// way so a partially correct submission is not lost.
    pub async fn answer_questionnaire(
        &self,
        answers: &[QuestionAnswer],
    ) -> Result<(), ApplicationError> {
        // Conditional rules read earlier answers, including earlier
        // entries of this batch.
        let mut working = self.responses.answers(self.mandate_id).await?;
        let mut failures: Vec<ValidationFailure> = Vec::new();

        for answer in answers {
            let validator = AnswersValidator::new(&working, self.today);
            if !validator.valid(&answer.question_identifier, &answer.raw_text) {
                failures.push(ValidationFailure::new(
                    &answer.question_identifier,
                    "rejected by field rule",
                ));
                continue;
            }

            if answer.is_blank() {
                self.delete_retracted_profile_datum(&answer.question_identifier).await?;
            }

            self.responses.persist_answer(self.mandate_id, answer).await?;
            working.put(&answer.question_identifier, &answer.raw_text);

            if !answer.is_blank() {
                self.sync_mandate_field(answer).await?;
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidAnswers { failures }.into())
        }
    }

    /// Marks the response completed. Requires a synced birthdate; emits
    /// the CRM completion event only for accepted mandates and only
    /// behind the feature flag.
    pub async fn finalize(&self) -> Result<(), ApplicationError> {
        let mandate = self
            .mandates
            .find(self.mandate_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("mandate", self.mandate_id.0))?;

        if mandate.birthdate.is_none() {
            return Err(DomainError::validation("birthdate_is_empty").into());
        }

        self.responses.mark_completed(self.mandate_id).await?;

        if mandate.state == MandateState::Accepted && self.crm_events_enabled {
            self.events
                .enqueue_crm_event(self.mandate_id, QUESTIONNAIRE_COMPLETED_EVENT)
                .await?;
            info!(mandate_id = self.mandate_id.0, "enqueued questionnaire completion event");
        }

        Ok(())
    }

    /// A blank re-answer is an "I don't want to answer" retraction; the
    /// matching profile datum must not linger.
    async fn delete_retracted_profile_datum(
        &self,
        question_identifier: &str,
    ) -> Result<(), ApplicationError> {
        if self.profile_data.exists(self.mandate_id, question_identifier).await? {
            self.profile_data.delete(self.mandate_id, question_identifier).await?;
        }
        Ok(())
    }

    async fn sync_mandate_field(&self, answer: &QuestionAnswer) -> Result<(), ApplicationError> {
        let text = answer.raw_text.trim();

        match answer.question_identifier.as_str() {
            questions::BIRTHDATE => {
                if let Some(birthdate) = parse_answer_date(text) {
                    self.mandates.update_birthdate(self.mandate_id, birthdate).await?;
                }
            }
            questions::GENDER => {
                if let Some(gender) = Gender::parse(text) {
                    self.mandates.update_gender(self.mandate_id, gender).await?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}
