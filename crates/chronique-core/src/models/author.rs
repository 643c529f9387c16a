use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A canonical author. `book_ids` is the back-reference list that the
/// merge cascade pulls deleted book ids from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalAuthor {
    pub id: Uuid,
    pub name: String,

    #[serde(default)]
    pub book_ids: BTreeSet<Uuid>,
}

impl CanonicalAuthor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            book_ids: BTreeSet::new(),
        }
    }
}
