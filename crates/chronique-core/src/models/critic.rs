use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A canonical critic. Rosters are small and curated, so alternative
/// spellings are enumerated in `variants` rather than fuzzy-matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalCritic {
    pub id: Uuid,
    pub name: String,

    #[serde(default)]
    pub variants: Vec<String>,
}

impl CanonicalCritic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            variants: Vec::new(),
        }
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }
}
