//! Maps the current questionnaire answers to the mandate's
//! recommendation set: desired-set evaluation, upsert, offer-protected
//! cleanup and umbrella suppression.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::domain::category::{idents, CategoryCatalog};
use crate::domain::mandate::Mandate;
use crate::domain::portfolio::Portfolio;
use crate::domain::questionnaire::{questions, AnswerSet};
use crate::domain::recommendation::{Recommendation, RecommendationLevel};

use super::answers::{parse_answer_amount, parse_answer_date};
use super::mandatory::MandatoryRecommendations;
use super::rules::RuleSet;

/// Everything the rule evaluation reads. The builder never touches
/// storage; the caller loads the context and persists the returned set.
pub struct DemandContext<'a> {
    pub mandate: &'a Mandate,
    pub answers: &'a AnswerSet,
    pub today: NaiveDate,
    pub portfolio: &'a Portfolio,
    /// Categories with an active offer attached; their recommendations
    /// survive cleanup to protect in-flight sales.
    pub offer_protected: &'a HashSet<String>,
    pub catalog: &'a CategoryCatalog,
}

impl DemandContext<'_> {
    /// Mandate age, falling back to the birthdate answer when the
    /// mandate record has not been synced yet.
    fn age(&self) -> Option<u32> {
        let birthdate = self
            .mandate
            .birthdate
            .or_else(|| self.answers.present(questions::BIRTHDATE).and_then(parse_answer_date))?;

        Some(self.today.years_since(birthdate).unwrap_or(0))
    }
}

pub struct RecommendationsBuilder {
    rules: RuleSet,
}

impl RecommendationsBuilder {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn standard() -> Self {
        Self::new(RuleSet::standard())
    }

    /// Applies the rule set to the existing recommendation set and
    /// returns the new one. Dropped entries are simply absent from the
    /// result. Running twice with unchanged inputs is a fixpoint.
    pub fn apply_rules(
        &self,
        ctx: &DemandContext<'_>,
        existing: Vec<Recommendation>,
    ) -> Vec<Recommendation> {
        let desired = self.desired_levels(ctx);
        let mandatory = MandatoryRecommendations::new(ctx.answers, ctx.portfolio);

        let mut result: Vec<Recommendation> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for mut recommendation in existing {
            // One recommendation per (mandate, category).
            if !seen.insert(recommendation.category_ident.clone()) {
                continue;
            }

            match desired.get(&recommendation.category_ident) {
                Some(level) => {
                    let keeps_important = recommendation.level == RecommendationLevel::Important
                        && *level == RecommendationLevel::Recommended
                        && mandatory.implied(&recommendation.category_ident);

                    if !keeps_important {
                        recommendation.level = *level;
                    }
                    result.push(recommendation);
                }
                None => {
                    if ctx.offer_protected.contains(&recommendation.category_ident) {
                        result.push(recommendation);
                    }
                }
            }
        }

        for (category_ident, level) in &desired {
            if seen.insert(category_ident.clone()) {
                result.push(Recommendation::new(ctx.mandate.id, category_ident, *level));
            }
        }

        self.suppress_umbrella_subs(ctx, &desired, &mut result);

        result.sort_by(|a, b| a.category_ident.cmp(&b.category_ident));
        mandatory.apply(&mut result);

        result
    }

    /// A desired umbrella obsoletes its included sub-categories; only an
    /// active offer keeps a sub's recommendation alive.
    fn suppress_umbrella_subs(
        &self,
        ctx: &DemandContext<'_>,
        desired: &BTreeMap<String, RecommendationLevel>,
        result: &mut Vec<Recommendation>,
    ) {
        let suppressed: HashSet<&String> = desired
            .keys()
            .filter(|ident| ctx.catalog.find(ident).is_some_and(|category| category.is_umbrella()))
            .flat_map(|ident| ctx.catalog.included_idents(ident))
            .collect();

        if suppressed.is_empty() {
            return;
        }

        result.retain(|recommendation| {
            !suppressed.contains(&recommendation.category_ident)
                || ctx.offer_protected.contains(&recommendation.category_ident)
        });
    }

    fn desired_levels(&self, ctx: &DemandContext<'_>) -> BTreeMap<String, RecommendationLevel> {
        let age = ctx.age();
        let mut desired: BTreeMap<String, RecommendationLevel> = BTreeMap::new();

        for rule in self.rules.answer_rules {
            if !rule.age_applies(age) || !rule.matcher.matches(ctx.answers, rule.question) {
                continue;
            }
            for category in rule.categories {
                insert_level(&mut desired, category, rule.level);
            }
        }

        if let Some(job) = ctx.answers.present(questions::JOB) {
            if let Some(job_rule) = self.rules.job_rule(job) {
                for category in job_rule.categories {
                    insert_level(&mut desired, category, RecommendationLevel::Recommended);
                }

                if let Some(disability) = self.disability_track(ctx, job_rule.disability, age) {
                    insert_level(&mut desired, disability, RecommendationLevel::Recommended);
                }

                if let Some(threshold) = job_rule.statutory_pkv_above {
                    if self.statutory_high_earner(ctx, threshold) {
                        insert_level(&mut desired, idents::PKV, RecommendationLevel::Recommended);
                    }
                }
            }
        }

        desired
    }

    /// Baseline disability category from the job rule, overridden by the
    /// occupation catalog when a job title matches and the mandate is
    /// young enough for the lookup.
    fn disability_track(
        &self,
        ctx: &DemandContext<'_>,
        baseline: Option<&'static str>,
        age: Option<u32>,
    ) -> Option<&'static str> {
        let lookup_allowed = age.is_some_and(|age| age <= self.rules.job_title_max_age);
        if !lookup_allowed {
            return baseline;
        }

        let Some(job_title) = ctx.answers.present(questions::JOB_TITLE) else {
            return baseline;
        };
        let job_title = job_title.to_lowercase();
        let Some(occupation) = self
            .rules
            .occupations
            .iter()
            .find(|occupation| job_title.contains(occupation.title_keyword))
        else {
            return baseline;
        };

        let bu_applies =
            occupation.bu_condition.map_or(true, |condition| condition.holds(ctx.answers));
        if bu_applies {
            return Some(idents::BU);
        }

        let du_applies =
            occupation.du_condition.is_some_and(|condition| condition.holds(ctx.answers));
        if du_applies {
            return Some(idents::DU);
        }

        Some(idents::EXISTENZSCHUTZ)
    }

    fn statutory_high_earner(&self, ctx: &DemandContext<'_>, threshold: f64) -> bool {
        if !ctx.answers.is(questions::HEALTH_INSURANCE, "gesetzlich") {
            return false;
        }

        ctx.answers
            .present(questions::SALARY)
            .and_then(parse_answer_amount)
            .is_some_and(|salary| salary >= threshold)
    }
}

/// An explicit dismissal is deliberate and never overridden by a plain
/// recommendation for the same category.
fn insert_level(
    desired: &mut BTreeMap<String, RecommendationLevel>,
    category: &str,
    level: RecommendationLevel,
) {
    match desired.get(category) {
        Some(RecommendationLevel::Dismissed) => {}
        _ => {
            desired.insert(category.to_owned(), level);
        }
    }
}
