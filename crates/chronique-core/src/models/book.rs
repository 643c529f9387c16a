use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authoritative stored representation of a book.
///
/// Mutated only by the merge coordinator (for merges) and by upstream
/// write paths; everything else reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalBook {
    pub id: Uuid,
    pub title: String,
    pub author_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Authoritative catalog URL. Two books sharing one represent the
    /// same work and are candidates for merging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_key: Option<String>,

    #[serde(default)]
    pub episode_refs: BTreeSet<Uuid>,

    #[serde(default)]
    pub review_refs: BTreeSet<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl CanonicalBook {
    pub fn new(title: impl Into<String>, author_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            author_id,
            publisher: None,
            identity_key: None,
            episode_refs: BTreeSet::new(),
            review_refs: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_book_has_empty_refs() {
        let author = Uuid::now_v7();
        let book = CanonicalBook::new("Le Grand Jabadao", author);
        assert_eq!(book.title, "Le Grand Jabadao");
        assert_eq!(book.author_id, author);
        assert!(book.identity_key.is_none());
        assert!(book.episode_refs.is_empty());
        assert!(book.review_refs.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let mut book = CanonicalBook::new("Trilogie de Helsinki", Uuid::now_v7());
        book.publisher = Some("Actes Sud".to_string());
        book.identity_key = Some("https://catalog.example/oeuvre/42".to_string());
        book.episode_refs.insert(Uuid::now_v7());

        let json = serde_json::to_string(&book).unwrap();
        let back: CanonicalBook = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, book.id);
        assert_eq!(back.episode_refs, book.episode_refs);
        assert_eq!(back.identity_key, book.identity_key);
    }
}
