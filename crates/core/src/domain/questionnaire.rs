use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Question identifiers of the demand-check questionnaire.
pub mod questions {
    pub const BIRTHDATE: &str = "demand_birthdate";
    pub const GENDER: &str = "demand_gender";
    pub const LIVINGPLACE: &str = "demand_livingplace";
    pub const FAMILY: &str = "demand_family";
    pub const KIDS: &str = "demand_kids";
    pub const NUMBER_OF_KIDS: &str = "demand_number_of_kids";
    pub const JOB: &str = "demand_job";
    pub const JOB_TITLE: &str = "demand_job_title";
    pub const SALARY: &str = "demand_salary";
    pub const SPENDING: &str = "demand_monthly_spending";
    pub const PETS: &str = "demand_pets";
    pub const VEHICLE: &str = "demand_vehicle";
    pub const ESTATE: &str = "demand_estate";
    pub const HEALTH_INSURANCE: &str = "demand_health_insurance";
    pub const TRAVEL: &str = "demand_travel";

    /// Priority questions share this prefix; the suffix names the topic.
    pub const PRIORITY_PREFIX: &str = "demand_priority_";
}

/// Employment types offered by `demand_job`.
pub mod jobs {
    pub const ANGESTELLTER: &str = "Angestellter";
    pub const SELBSTSTAENDIGER: &str = "Selbstständiger";
    pub const FREIBERUFLER: &str = "Freiberufler";
    pub const BEAMTER: &str = "Beamter";
    pub const STUDENT: &str = "Student";
    pub const AUSZUBILDENDER: &str = "Auszubildender";
    pub const RENTNER: &str = "Rentner";
    pub const ARBEITSSUCHEND: &str = "Arbeitssuchend";
    pub const HAUSFRAU_HAUSMANN: &str = "Hausfrau/Hausmann";

    pub const ALL: &[&str] = &[
        ANGESTELLTER,
        SELBSTSTAENDIGER,
        FREIBERUFLER,
        BEAMTER,
        STUDENT,
        AUSZUBILDENDER,
        RENTNER,
        ARBEITSSUCHEND,
        HAUSFRAU_HAUSMANN,
    ];
}

/// One free-form questionnaire answer as entered by the customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question_identifier: String,
    pub raw_text: String,
}

impl QuestionAnswer {
    pub fn new(question_identifier: &str, raw_text: &str) -> Self {
        Self {
            question_identifier: question_identifier.to_owned(),
            raw_text: raw_text.to_owned(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}

/// The answers given so far, keyed by question identifier. Later answers
/// to the same question replace earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    answers: BTreeMap<String, String>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_answers(answers: &[QuestionAnswer]) -> Self {
        let mut set = Self::new();
        for answer in answers {
            set.put(&answer.question_identifier, &answer.raw_text);
        }
        set
    }

    pub fn put(&mut self, question_identifier: &str, raw_text: &str) {
        self.answers.insert(question_identifier.to_owned(), raw_text.to_owned());
    }

    pub fn get(&self, question_identifier: &str) -> Option<&str> {
        self.answers.get(question_identifier).map(String::as_str)
    }

    /// The answer with surrounding whitespace stripped, `None` when the
    /// question is unanswered or blank.
    pub fn present(&self, question_identifier: &str) -> Option<&str> {
        self.get(question_identifier).map(str::trim).filter(|text| !text.is_empty())
    }

    pub fn is(&self, question_identifier: &str, expected: &str) -> bool {
        self.present(question_identifier).is_some_and(|text| text == expected)
    }

    /// Multi-select answers arrive comma-joined; membership is checked
    /// per selected item.
    pub fn selected(&self, question_identifier: &str, item: &str) -> bool {
        self.present(question_identifier)
            .is_some_and(|text| text.split(',').any(|part| part.trim() == item))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.answers.iter().map(|(question, text)| (question.as_str(), text.as_str()))
    }
}
