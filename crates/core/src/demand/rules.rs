//! The demand-check rule set as data: answer rules, job baselines and
//! the occupation catalog. One interpreter in `builder.rs` evaluates
//! everything; the tables stay testable on their own.

use crate::domain::category::idents;
use crate::domain::questionnaire::{jobs, questions, AnswerSet};
use crate::domain::recommendation::RecommendationLevel;

#[derive(Clone, Copy, Debug)]
pub enum AnswerMatcher {
    /// Question answered with any non-blank text.
    Present,
    Equals(&'static str),
    OneOf(&'static [&'static str]),
    /// Multi-select answer contains at least one of the listed items.
    AnySelected(&'static [&'static str]),
}

impl AnswerMatcher {
    pub fn matches(&self, answers: &AnswerSet, question: &str) -> bool {
        match self {
            Self::Present => answers.present(question).is_some(),
            Self::Equals(expected) => answers.is(question, expected),
            Self::OneOf(allowed) => {
                answers.present(question).is_some_and(|text| allowed.contains(&text))
            }
            Self::AnySelected(items) => {
                items.iter().any(|item| answers.selected(question, item))
            }
        }
    }
}

/// One declarative mapping from an answer to category recommendations,
/// optionally gated by the mandate's age.
#[derive(Clone, Copy, Debug)]
pub struct RecommendationRule {
    pub question: &'static str,
    pub matcher: AnswerMatcher,
    pub categories: &'static [&'static str],
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub level: RecommendationLevel,
}

impl RecommendationRule {
    pub fn age_applies(&self, age: Option<u32>) -> bool {
        match (self.min_age, self.max_age) {
            (None, None) => true,
            // Age-gated rules need a known age to fire.
            _ => age.is_some_and(|age| {
                self.min_age.map_or(true, |min| age >= min)
                    && self.max_age.map_or(true, |max| age <= max)
            }),
        }
    }
}

const TERM_LIFE_MAX_AGE: u32 = 45;
const CARE_MIN_AGE: u32 = 40;

pub const RECOMMENDATION_RULES: &[RecommendationRule] = &[
    RecommendationRule {
        question: questions::LIVINGPLACE,
        matcher: AnswerMatcher::Equals("Eigentum"),
        categories: &[idents::WOHNGEBAEUDE, idents::HAUSRAT],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::LIVINGPLACE,
        matcher: AnswerMatcher::Equals("Miete"),
        categories: &[idents::HAUSRAT],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::ESTATE,
        matcher: AnswerMatcher::Equals("Ja"),
        categories: &[idents::WOHNGEBAEUDE],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::VEHICLE,
        matcher: AnswerMatcher::AnySelected(&["Auto", "Motorrad"]),
        categories: &[idents::KFZ],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::PETS,
        matcher: AnswerMatcher::AnySelected(&["Hund", "Pferd"]),
        categories: &[idents::TIERHALTERHAFTPFLICHT],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::KIDS,
        matcher: AnswerMatcher::Equals("Ja"),
        categories: &[idents::RISIKOLEBEN],
        min_age: None,
        max_age: Some(TERM_LIFE_MAX_AGE),
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::FAMILY,
        matcher: AnswerMatcher::OneOf(&["Verheiratet", "Mit Partner zusammenlebend"]),
        categories: &[idents::RISIKOLEBEN],
        min_age: None,
        max_age: Some(TERM_LIFE_MAX_AGE),
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::BIRTHDATE,
        matcher: AnswerMatcher::Present,
        categories: &[idents::PFLEGE],
        min_age: Some(CARE_MIN_AGE),
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::TRAVEL,
        matcher: AnswerMatcher::Equals("Ja"),
        categories: &[idents::REISE],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::HEALTH_INSURANCE,
        matcher: AnswerMatcher::Equals("gesetzlich"),
        categories: &[idents::GKV, idents::ZAHNZUSATZ],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    RecommendationRule {
        question: questions::HEALTH_INSURANCE,
        matcher: AnswerMatcher::Equals("privat"),
        categories: &[idents::PKV],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Recommended,
    },
    // Personas without pension-relevant income keep a dismissed
    // placeholder so the advice screen can explain the gap.
    RecommendationRule {
        question: questions::JOB,
        matcher: AnswerMatcher::OneOf(&[
            jobs::STUDENT,
            jobs::ARBEITSSUCHEND,
            jobs::HAUSFRAU_HAUSMANN,
            jobs::RENTNER,
        ]),
        categories: &[idents::GESETZLICHE_RENTE],
        min_age: None,
        max_age: None,
        level: RecommendationLevel::Dismissed,
    },
];

/// Baseline categories per employment type. `statutory_pkv_above` is the
/// yearly income from which a statutorily insured person gets a private
/// health insurance recommendation (0.0 = regardless of income).
#[derive(Clone, Copy, Debug)]
pub struct JobRule {
    pub job: &'static str,
    pub categories: &'static [&'static str],
    pub disability: Option<&'static str>,
    pub statutory_pkv_above: Option<f64>,
}

/// Yearly gross income above which employees may leave statutory health
/// insurance.
pub const STATUTORY_INSURANCE_INCOME_THRESHOLD: f64 = 69_300.0;

pub const JOB_RULES: &[JobRule] = &[
    JobRule {
        job: jobs::ANGESTELLTER,
        categories: &[idents::PHV, idents::UNFALL, idents::PRIVATE_RENTE],
        disability: Some(idents::BU),
        statutory_pkv_above: Some(STATUTORY_INSURANCE_INCOME_THRESHOLD),
    },
    JobRule {
        job: jobs::SELBSTSTAENDIGER,
        categories: &[idents::PHV, idents::UNFALL, idents::ALTERSVORSORGE],
        disability: Some(idents::BU),
        statutory_pkv_above: Some(0.0),
    },
    JobRule {
        job: jobs::FREIBERUFLER,
        categories: &[idents::PHV, idents::UNFALL, idents::ALTERSVORSORGE],
        disability: Some(idents::BU),
        statutory_pkv_above: Some(0.0),
    },
    JobRule {
        job: jobs::BEAMTER,
        categories: &[idents::PHV, idents::UNFALL, idents::PRIVATE_RENTE],
        disability: Some(idents::DU),
        statutory_pkv_above: None,
    },
    JobRule {
        job: jobs::AUSZUBILDENDER,
        categories: &[idents::PHV, idents::UNFALL],
        disability: Some(idents::BU),
        statutory_pkv_above: None,
    },
    JobRule {
        job: jobs::STUDENT,
        categories: &[idents::PHV],
        disability: None,
        statutory_pkv_above: None,
    },
    JobRule {
        job: jobs::RENTNER,
        categories: &[idents::PHV, idents::UNFALL],
        disability: None,
        statutory_pkv_above: None,
    },
    JobRule {
        job: jobs::ARBEITSSUCHEND,
        categories: &[idents::PHV],
        disability: None,
        statutory_pkv_above: None,
    },
    JobRule {
        job: jobs::HAUSFRAU_HAUSMANN,
        categories: &[idents::PHV],
        disability: None,
        statutory_pkv_above: None,
    },
];

/// A question/answer pair that must also hold for an occupation's
/// disability track to apply.
#[derive(Clone, Copy, Debug)]
pub struct OccupationCondition {
    pub question: &'static str,
    pub answer: &'static str,
}

impl OccupationCondition {
    pub fn holds(&self, answers: &AnswerSet) -> bool {
        answers.is(self.question, self.answer)
    }
}

/// An entry of the occupation catalog. A `None` BU condition means BU is
/// recommended unconditionally for this occupation.
#[derive(Clone, Copy, Debug)]
pub struct Occupation {
    pub title_keyword: &'static str,
    pub bu_condition: Option<OccupationCondition>,
    pub du_condition: Option<OccupationCondition>,
}

pub const OCCUPATIONS: &[Occupation] = &[
    Occupation {
        title_keyword: "lehrer",
        bu_condition: Some(OccupationCondition {
            question: questions::JOB,
            answer: jobs::ANGESTELLTER,
        }),
        du_condition: Some(OccupationCondition {
            question: questions::JOB,
            answer: jobs::BEAMTER,
        }),
    },
    Occupation {
        title_keyword: "polizist",
        bu_condition: Some(OccupationCondition {
            question: questions::JOB,
            answer: jobs::ANGESTELLTER,
        }),
        du_condition: Some(OccupationCondition {
            question: questions::JOB,
            answer: jobs::BEAMTER,
        }),
    },
    // High-risk manual trades: BU premiums are prohibitive on statutory
    // tariffs, labor protection covers the rest.
    Occupation {
        title_keyword: "dachdecker",
        bu_condition: Some(OccupationCondition {
            question: questions::HEALTH_INSURANCE,
            answer: "privat",
        }),
        du_condition: None,
    },
    Occupation {
        title_keyword: "gerüstbauer",
        bu_condition: Some(OccupationCondition {
            question: questions::HEALTH_INSURANCE,
            answer: "privat",
        }),
        du_condition: None,
    },
    Occupation {
        title_keyword: "softwareentwickler",
        bu_condition: None,
        du_condition: None,
    },
];

pub fn find_occupation(job_title: &str) -> Option<&'static Occupation> {
    let normalized = job_title.to_lowercase();
    OCCUPATIONS.iter().find(|occupation| normalized.contains(occupation.title_keyword))
}

/// The complete rule set evaluated by the builder. Constructed once and
/// injected; no global mutable state.
#[derive(Clone, Copy, Debug)]
pub struct RuleSet {
    pub answer_rules: &'static [RecommendationRule],
    pub job_rules: &'static [JobRule],
    pub occupations: &'static [Occupation],
    /// Job-title lookup only applies up to this mandate age.
    pub job_title_max_age: u32,
}

impl RuleSet {
    pub fn standard() -> Self {
        Self {
            answer_rules: RECOMMENDATION_RULES,
            job_rules: JOB_RULES,
            occupations: OCCUPATIONS,
            job_title_max_age: 50,
        }
    }

    pub fn job_rule(&self, job: &str) -> Option<&JobRule> {
        self.job_rules.iter().find(|rule| rule.job == job)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::questionnaire::{questions, AnswerSet, QuestionAnswer};

    use super::{find_occupation, AnswerMatcher, RecommendationRule, RuleSet};

    fn answers(pairs: &[(&str, &str)]) -> AnswerSet {
        let list: Vec<QuestionAnswer> =
            pairs.iter().map(|(question, text)| QuestionAnswer::new(question, text)).collect();
        AnswerSet::from_answers(&list)
    }

    #[test]
    fn matchers_cover_equality_membership_and_selection() {
        let set = answers(&[
            (questions::LIVINGPLACE, "Eigentum"),
            (questions::PETS, "Katze, Hund"),
            (questions::FAMILY, "Verheiratet"),
        ]);

        assert!(AnswerMatcher::Equals("Eigentum").matches(&set, questions::LIVINGPLACE));
        assert!(!AnswerMatcher::Equals("Miete").matches(&set, questions::LIVINGPLACE));
        assert!(AnswerMatcher::AnySelected(&["Hund", "Pferd"]).matches(&set, questions::PETS));
        assert!(!AnswerMatcher::AnySelected(&["Pferd"]).matches(&set, questions::PETS));
        assert!(AnswerMatcher::OneOf(&["Verheiratet", "Single"]).matches(&set, questions::FAMILY));
        assert!(AnswerMatcher::Present.matches(&set, questions::FAMILY));
        assert!(!AnswerMatcher::Present.matches(&set, questions::SALARY));
    }

    #[test]
    fn age_gates_require_a_known_age() {
        let gated = RecommendationRule {
            question: questions::KIDS,
            matcher: AnswerMatcher::Equals("Ja"),
            categories: &[],
            min_age: None,
            max_age: Some(45),
            level: crate::domain::recommendation::RecommendationLevel::Recommended,
        };

        assert!(gated.age_applies(Some(30)));
        assert!(gated.age_applies(Some(45)));
        assert!(!gated.age_applies(Some(46)));
        assert!(!gated.age_applies(None));
    }

    #[test]
    fn occupation_lookup_is_substring_and_case_insensitive() {
        assert!(find_occupation("Dachdeckermeister").is_some());
        assert!(find_occupation("LEHRERIN").is_some());
        assert!(find_occupation("Bäcker").is_none());
    }

    #[test]
    fn every_job_value_has_a_baseline_rule() {
        let rules = RuleSet::standard();
        for job in crate::domain::questionnaire::jobs::ALL {
            assert!(rules.job_rule(job).is_some(), "missing baseline for {job}");
        }
    }
}
