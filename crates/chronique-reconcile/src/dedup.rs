//! Duplicate detection over the canonical store.

use chronique_core::{Database, DuplicateGroup};

use crate::error::Result;

pub struct DuplicateDetector;

impl DuplicateDetector {
    /// Group canonical books sharing an identity key, keeping only
    /// real duplicates (member count > 1). Pure read; groups come
    /// back largest first so the most impactful merges run early.
    pub fn find_groups(db: &Database) -> Result<Vec<DuplicateGroup>> {
        let groups = db
            .books_by_identity_key()?
            .into_iter()
            .map(|(identity_key, member_ids)| DuplicateGroup {
                identity_key,
                member_ids,
            })
            .collect();
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronique_core::{CanonicalAuthor, CanonicalBook};

    fn seed_with_key(db: &Database, author: &CanonicalAuthor, title: &str, key: Option<&str>) {
        let mut book = CanonicalBook::new(title, author.id);
        book.identity_key = key.map(ToOwned::to_owned);
        db.upsert_book(&book).unwrap();
    }

    #[test]
    fn finds_one_group_and_no_singletons() {
        let db = Database::open_in_memory().unwrap();
        let author = CanonicalAuthor::new("Pirkko Saisio");
        db.upsert_author(&author).unwrap();

        let shared = "https://catalog.example/w/helsinki";
        seed_with_key(&db, &author, "Trilogie de Helsinki", Some(shared));
        seed_with_key(&db, &author, "Trilogie de Helsinki (réimpr.)", Some(shared));
        seed_with_key(&db, &author, "Le livre rouge des ruptures", Some(shared));
        seed_with_key(&db, &author, "Autre œuvre", Some("https://catalog.example/w/other"));

        let groups = DuplicateDetector::find_groups(&db).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].identity_key, shared);
        assert_eq!(groups[0].member_count(), 3);
    }

    #[test]
    fn groups_come_back_largest_first() {
        let db = Database::open_in_memory().unwrap();
        let author = CanonicalAuthor::new("A");
        db.upsert_author(&author).unwrap();

        for i in 0..2 {
            seed_with_key(&db, &author, &format!("Pair {i}"), Some("key-pair"));
        }
        for i in 0..4 {
            seed_with_key(&db, &author, &format!("Quad {i}"), Some("key-quad"));
        }

        let groups = DuplicateDetector::find_groups(&db).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].identity_key, "key-quad");
        assert_eq!(groups[1].identity_key, "key-pair");
    }

    #[test]
    fn empty_store_yields_no_groups() {
        let db = Database::open_in_memory().unwrap();
        assert!(DuplicateDetector::find_groups(&db).unwrap().is_empty());
    }
}
