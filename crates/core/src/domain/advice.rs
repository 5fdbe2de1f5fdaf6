use serde::{Deserialize, Serialize};

/// Advice card shown for an existing contract: keep it or switch it.
/// Upstream scoring appends one classification per evaluation pass, so
/// the list can carry several entries for the same card.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitcherAdvice {
    pub category_ident: String,
    pub classifications: Vec<String>,
}

impl SwitcherAdvice {
    pub fn new(category_ident: &str) -> Self {
        Self { category_ident: category_ident.to_owned(), classifications: Vec::new() }
    }

    pub fn with_classifications(mut self, classifications: &[&str]) -> Self {
        self.classifications = classifications.iter().map(|c| (*c).to_owned()).collect();
        self
    }

    /// The effective classification. The last entry wins: passes append
    /// in evaluation order and the newest verdict supersedes the rest.
    pub fn classification(&self) -> Option<&str> {
        self.classifications.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::SwitcherAdvice;

    #[test]
    fn last_classification_wins() {
        let advice = SwitcherAdvice::new("kfz").with_classifications(&["keeper", "switcher"]);
        assert_eq!(advice.classification(), Some("switcher"));

        let reversed = SwitcherAdvice::new("kfz").with_classifications(&["switcher", "keeper"]);
        assert_eq!(reversed.classification(), Some("keeper"));
    }

    #[test]
    fn no_classifications_means_no_verdict() {
        assert_eq!(SwitcherAdvice::new("kfz").classification(), None);
    }
}
