use serde::{Deserialize, Serialize};

/// Category idents used by the rule tables. The catalog itself is
/// read-only reference data maintained outside this crate.
pub mod idents {
    pub const PHV: &str = "phv";
    pub const HAUSRAT: &str = "hausrat";
    pub const WOHNGEBAEUDE: &str = "wohngebaeude";
    pub const KFZ: &str = "kfz";
    pub const TIERHALTERHAFTPFLICHT: &str = "tierhalterhaftpflicht";
    pub const RISIKOLEBEN: &str = "risikoleben";
    pub const PFLEGE: &str = "pflege";
    pub const UNFALL: &str = "unfall";
    pub const RECHTSSCHUTZ: &str = "rechtsschutz";
    pub const REISE: &str = "reise";
    pub const ZAHNZUSATZ: &str = "zahnzusatz";

    pub const BU: &str = "bu";
    pub const DU: &str = "du";
    pub const EXISTENZSCHUTZ: &str = "existenzschutz";

    pub const GKV: &str = "gkv";
    pub const PKV: &str = "pkv";

    pub const ALTERSVORSORGE: &str = "altersvorsorge";
    pub const GESETZLICHE_RENTE: &str = "gesetzliche_rente";
    pub const PRIVATE_RENTE: &str = "private_rente";
    pub const RUERUP_RENTE: &str = "ruerup_rente";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    Normal,
    Umbrella,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub ident: String,
    pub category_type: CategoryType,
    pub included_category_idents: Vec<String>,
}

impl Category {
    pub fn normal(ident: &str) -> Self {
        Self {
            ident: ident.to_owned(),
            category_type: CategoryType::Normal,
            included_category_idents: Vec::new(),
        }
    }

    pub fn umbrella(ident: &str, included: &[&str]) -> Self {
        Self {
            ident: ident.to_owned(),
            category_type: CategoryType::Umbrella,
            included_category_idents: included.iter().map(|i| (*i).to_owned()).collect(),
        }
    }

    pub fn is_umbrella(&self) -> bool {
        self.category_type == CategoryType::Umbrella
    }
}

/// Lookup view over the category reference data.
#[derive(Clone, Debug, Default)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
}

impl CategoryCatalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// The catalog shipped with the demand-check rules: every ident the
    /// rule tables can emit, with the retirement umbrella wired up.
    pub fn standard() -> Self {
        use idents::*;

        Self::new(vec![
            Category::normal(PHV),
            Category::normal(HAUSRAT),
            Category::normal(WOHNGEBAEUDE),
            Category::normal(KFZ),
            Category::normal(TIERHALTERHAFTPFLICHT),
            Category::normal(RISIKOLEBEN),
            Category::normal(PFLEGE),
            Category::normal(UNFALL),
            Category::normal(RECHTSSCHUTZ),
            Category::normal(REISE),
            Category::normal(ZAHNZUSATZ),
            Category::normal(BU),
            Category::normal(DU),
            Category::normal(EXISTENZSCHUTZ),
            Category::normal(GKV),
            Category::normal(PKV),
            Category::umbrella(ALTERSVORSORGE, &[GESETZLICHE_RENTE, PRIVATE_RENTE, RUERUP_RENTE]),
            Category::normal(GESETZLICHE_RENTE),
            Category::normal(PRIVATE_RENTE),
            Category::normal(RUERUP_RENTE),
        ])
    }

    pub fn find(&self, ident: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.ident == ident)
    }

    pub fn included_idents(&self, umbrella_ident: &str) -> &[String] {
        self.find(umbrella_ident)
            .filter(|category| category.is_umbrella())
            .map(|category| category.included_category_idents.as_slice())
            .unwrap_or(&[])
    }
}
