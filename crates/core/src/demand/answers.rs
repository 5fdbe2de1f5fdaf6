//! Per-question validation of free-form questionnaire answers.
//!
//! The rules are a declarative table interpreted by one generic checker.
//! Malformed input is invalid, never an error; blank input is valid
//! unless the field's rule requires presence.

use chrono::NaiveDate;

use crate::domain::questionnaire::{jobs, questions, AnswerSet};

const GENDERS: &[&str] = &["Herr", "Frau"];
const LIVINGPLACES: &[&str] = &["Eigentum", "Miete"];
const FAMILY_STATUSES: &[&str] =
    &["Single", "Verheiratet", "Mit Partner zusammenlebend", "Geschieden", "Verwitwet"];
const YES_NO: &[&str] = &["Ja", "Nein"];
const PET_SPECIES: &[&str] = &["Hund", "Katze", "Pferd", "Kleintier"];
const VEHICLES: &[&str] = &["Auto", "Motorrad", "Kein Fahrzeug"];
const HEALTH_INSURANCE_TYPES: &[&str] = &["gesetzlich", "privat"];

const MAX_PLAUSIBLE_AGE_YEARS: u32 = 150;

/// How one question's answer text is checked.
#[derive(Clone, Copy, Debug)]
enum ValueRule {
    /// Parseable date with a plausible implied age.
    Birthdate,
    /// Exactly one of the listed values.
    OneOf(&'static [&'static str]),
    /// Comma-separated subset of the listed values.
    SubsetOf(&'static [&'static str]),
    /// Integer within the inclusive range.
    IntRange { min: i64, max: i64 },
    /// Non-negative amount; some fields reject an explicit zero.
    Amount { zero_allowed: bool },
    /// Non-negative integer count, required when a prior answer matches.
    CountRequiredIf { question: &'static str, answer: &'static str },
}

const ANSWER_RULES: &[(&str, ValueRule)] = &[
    (questions::BIRTHDATE, ValueRule::Birthdate),
    (questions::GENDER, ValueRule::OneOf(GENDERS)),
    (questions::LIVINGPLACE, ValueRule::OneOf(LIVINGPLACES)),
    (questions::FAMILY, ValueRule::OneOf(FAMILY_STATUSES)),
    (questions::KIDS, ValueRule::OneOf(YES_NO)),
    (
        questions::NUMBER_OF_KIDS,
        ValueRule::CountRequiredIf { question: questions::KIDS, answer: "Ja" },
    ),
    (questions::JOB, ValueRule::OneOf(jobs::ALL)),
    (questions::SALARY, ValueRule::Amount { zero_allowed: true }),
    (questions::SPENDING, ValueRule::Amount { zero_allowed: false }),
    (questions::PETS, ValueRule::SubsetOf(PET_SPECIES)),
    (questions::VEHICLE, ValueRule::SubsetOf(VEHICLES)),
    (questions::ESTATE, ValueRule::OneOf(YES_NO)),
    (questions::HEALTH_INSURANCE, ValueRule::OneOf(HEALTH_INSURANCE_TYPES)),
    (questions::TRAVEL, ValueRule::OneOf(YES_NO)),
];

/// Parses the two date formats the front-ends send.
pub fn parse_answer_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

/// Normalizes German amount notation ("45.000,50") alongside plain
/// decimal input before parsing.
pub fn parse_answer_amount(text: &str) -> Option<f64> {
    let normalized = if text.contains(',') {
        text.replace('.', "").replace(',', ".")
    } else {
        text.to_owned()
    };

    let amount: f64 = normalized.trim().parse().ok()?;
    amount.is_finite().then_some(amount)
}

pub struct AnswersValidator<'a> {
    answers: &'a AnswerSet,
    today: NaiveDate,
}

impl<'a> AnswersValidator<'a> {
    /// `answers` is the set given so far; conditional rules read their
    /// trigger answers from it.
    pub fn new(answers: &'a AnswerSet, today: NaiveDate) -> Self {
        Self { answers, today }
    }

    pub fn valid(&self, question_identifier: &str, raw_text: &str) -> bool {
        let text = raw_text.trim();

        let Some(rule) = lookup_rule(question_identifier) else {
            // Unknown and free-text questions accept anything.
            return true;
        };

        if text.is_empty() {
            return !self.requires_presence(rule);
        }

        self.check(rule, text)
    }

    fn requires_presence(&self, rule: ValueRule) -> bool {
        match rule {
            ValueRule::CountRequiredIf { question, answer } => self.answers.is(question, answer),
            _ => false,
        }
    }

    fn check(&self, rule: ValueRule, text: &str) -> bool {
        match rule {
            ValueRule::Birthdate => self.plausible_birthdate(text),
            ValueRule::OneOf(allowed) => allowed.contains(&text),
            ValueRule::SubsetOf(allowed) => {
                let mut any = false;
                for item in text.split(',').map(str::trim).filter(|item| !item.is_empty()) {
                    if !allowed.contains(&item) {
                        return false;
                    }
                    any = true;
                }
                any
            }
            ValueRule::IntRange { min, max } => {
                text.parse::<i64>().is_ok_and(|value| value >= min && value <= max)
            }
            ValueRule::Amount { zero_allowed } => parse_answer_amount(text)
                .is_some_and(|amount| amount > 0.0 || (zero_allowed && amount == 0.0)),
            ValueRule::CountRequiredIf { .. } => {
                text.parse::<i64>().is_ok_and(|count| count >= 0)
            }
        }
    }

    fn plausible_birthdate(&self, text: &str) -> bool {
        let Some(birthdate) = parse_answer_date(text) else {
            return false;
        };

        if birthdate > self.today {
            return false;
        }

        self.today
            .years_since(birthdate)
            .is_some_and(|age| age <= MAX_PLAUSIBLE_AGE_YEARS)
    }
}

fn lookup_rule(question_identifier: &str) -> Option<ValueRule> {
    if question_identifier.starts_with(questions::PRIORITY_PREFIX) {
        return Some(ValueRule::IntRange { min: 1, max: 5 });
    }

    ANSWER_RULES
        .iter()
        .find(|(identifier, _)| *identifier == question_identifier)
        .map(|(_, rule)| *rule)
}
