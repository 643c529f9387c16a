//! End-to-end mention processing: match, resolve critics, persist.

use std::collections::HashMap;

use chronique_core::{Database, MatchPhase, Mention, ResolutionKey};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::ResolutionCache;
use crate::critics::CriticResolver;
use crate::error::Result;
use crate::matching::{MatchCandidate, MatchingEngine};
use crate::normalize::normalize;

/// Per-run tallies; serialized into run reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessSummary {
    pub total: usize,
    pub exact: usize,
    pub partial: usize,
    pub fuzzy: usize,
    pub author_fuzzy: usize,
    pub unresolved: usize,
    pub critics_resolved: usize,
}

impl ProcessSummary {
    fn record_phase(&mut self, phase: MatchPhase) {
        match phase {
            MatchPhase::Exact => self.exact += 1,
            MatchPhase::Partial => self.partial += 1,
            MatchPhase::Fuzzy => self.fuzzy += 1,
            MatchPhase::AuthorFuzzy => self.author_fuzzy += 1,
        }
    }
}

/// Drives a batch of extracted mentions through matching and into
/// the resolution cache.
pub struct ReconcilePipeline {
    engine: MatchingEngine,
}

impl ReconcilePipeline {
    pub fn new(engine: MatchingEngine) -> Self {
        Self { engine }
    }

    /// Process one extraction run. Every mention is attempted; a
    /// persistence failure on one mention is logged and never aborts
    /// its siblings. Re-running the same batch is a no-op at the
    /// store level thanks to the idempotent cache upsert.
    pub fn process_mentions(&self, db: &Database, mentions: &[Mention]) -> Result<ProcessSummary> {
        let candidates = load_candidates(db)?;
        let critics = db.list_critics()?;
        let cache = ResolutionCache::new(db);

        let mut summary = ProcessSummary {
            total: mentions.len(),
            ..Default::default()
        };

        for mention in mentions {
            let key = ResolutionKey {
                source_reference: mention.source_reference.clone(),
                author_norm: normalize(&mention.author_text),
                title_norm: normalize(&mention.title_text),
            };
            let critic_id = CriticResolver::resolve(&mention.critic_text, &critics);
            if critic_id.is_some() {
                summary.critics_resolved += 1;
            }

            let matched = self
                .engine
                .resolve(&mention.title_text, &mention.author_text, &candidates);

            let persisted = match matched {
                Some((book_id, phase)) => {
                    summary.record_phase(phase);
                    cache.suggest(&key, book_id, critic_id, phase)
                }
                None => {
                    summary.unresolved += 1;
                    cache.mark_not_found(&key, critic_id)
                }
            };
            if let Err(err) = persisted {
                tracing::warn!(
                    source_reference = %mention.source_reference,
                    title = %mention.title_text,
                    error = %err,
                    "failed to persist resolution for mention"
                );
            }
        }

        tracing::info!(
            total = summary.total,
            unresolved = summary.unresolved,
            "processed mention batch"
        );
        Ok(summary)
    }
}

/// Flatten the store into match candidates, joining author names in.
fn load_candidates(db: &Database) -> Result<Vec<MatchCandidate>> {
    let books = db.list_books()?;
    let mut author_names: HashMap<Uuid, String> = HashMap::new();
    for book in &books {
        if !author_names.contains_key(&book.author_id) {
            let name = db
                .get_author(&book.author_id)
                .map(|a| a.name)
                .unwrap_or_default();
            author_names.insert(book.author_id, name);
        }
    }
    Ok(books
        .into_iter()
        .map(|book| MatchCandidate {
            author_name: author_names.get(&book.author_id).cloned().unwrap_or_default(),
            book_id: book.id,
            title: book.title,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronique_core::{
        CanonicalAuthor, CanonicalBook, CanonicalCritic, MentionSection, ResolutionStatus,
    };

    fn seed(db: &Database) -> (CanonicalBook, CanonicalBook) {
        let sibran = CanonicalAuthor::new("Anne Sibran");
        let offutt = CanonicalAuthor::new("Chris Offutt");
        db.upsert_author(&sibran).unwrap();
        db.upsert_author(&offutt).unwrap();

        let jabadao = CanonicalBook::new("Le Grand Jabadao", sibran.id);
        let gilded = CanonicalBook::new("Le bon frère", offutt.id);
        db.upsert_book(&jabadao).unwrap();
        db.upsert_book(&gilded).unwrap();

        db.upsert_critic(
            &CanonicalCritic::new("Élisabeth Philippe").with_variants(["Elisabeth Philippe"]),
        )
        .unwrap();

        (jabadao, gilded)
    }

    fn mention(reference: &str, title: &str, author: &str, critic: &str) -> Mention {
        Mention::new(reference, MentionSection::Programme, title, author, critic)
    }

    #[test]
    fn batch_tallies_phases_and_persists_suggestions() {
        let db = Database::open_in_memory().unwrap();
        let (jabadao, gilded) = seed(&db);
        let pipeline = ReconcilePipeline::new(MatchingEngine::default());

        let mentions = vec![
            mention("ep-1", "Le Grand Jabadao", "Anne Sibran", "Elisabeth Philippe"),
            mention("ep-1", "Le bon frere", "Chris Hoffut", ""),
            mention("ep-1", "Ouvrage introuvable", "Personne", ""),
        ];
        let summary = pipeline.process_mentions(&db, &mentions).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.exact, 1);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.critics_resolved, 1);
        assert_eq!(summary.exact + summary.partial + summary.fuzzy + summary.author_fuzzy, 2);

        let cache = ResolutionCache::new(&db);
        let exact_key = ResolutionKey {
            source_reference: "ep-1".to_string(),
            author_norm: "anne sibran".to_string(),
            title_norm: "le grand jabadao".to_string(),
        };
        let entry = cache.get(&exact_key).unwrap().unwrap();
        assert_eq!(entry.status, ResolutionStatus::Suggested);
        assert_eq!(entry.resolved_book_id, Some(jabadao.id));
        assert!(entry.resolved_critic_id.is_some());

        let fuzzy_key = ResolutionKey {
            source_reference: "ep-1".to_string(),
            author_norm: "chris hoffut".to_string(),
            title_norm: "le bon frere".to_string(),
        };
        let entry = cache.get(&fuzzy_key).unwrap().unwrap();
        assert_eq!(entry.resolved_book_id, Some(gilded.id));

        let miss_key = ResolutionKey {
            source_reference: "ep-1".to_string(),
            author_norm: "personne".to_string(),
            title_norm: "ouvrage introuvable".to_string(),
        };
        let entry = cache.get(&miss_key).unwrap().unwrap();
        assert_eq!(entry.status, ResolutionStatus::NotFound);
        assert_eq!(entry.resolved_book_id, None);
    }

    #[test]
    fn reprocessing_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        let pipeline = ReconcilePipeline::new(MatchingEngine::default());

        let mentions = vec![
            mention("ep-2", "Le Grand Jabadao", "Anne Sibran", ""),
            mention("ep-2", "Rien de connu", "Inconnu", ""),
        ];
        pipeline.process_mentions(&db, &mentions).unwrap();
        let first_suggested = db
            .list_resolutions_by_status(ResolutionStatus::Suggested)
            .unwrap();
        let first_not_found = db
            .list_resolutions_by_status(ResolutionStatus::NotFound)
            .unwrap();

        // same batch again lands on the same rows
        pipeline.process_mentions(&db, &mentions).unwrap();
        let second_suggested = db
            .list_resolutions_by_status(ResolutionStatus::Suggested)
            .unwrap();
        let second_not_found = db
            .list_resolutions_by_status(ResolutionStatus::NotFound)
            .unwrap();

        assert_eq!(first_suggested.len(), 1);
        assert_eq!(second_suggested.len(), 1);
        assert_eq!(first_suggested[0].id, second_suggested[0].id);
        assert_eq!(first_not_found.len(), 1);
        assert_eq!(second_not_found.len(), 1);
    }

    #[test]
    fn empty_batch_yields_empty_summary() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = ReconcilePipeline::new(MatchingEngine::default());
        let summary = pipeline.process_mentions(&db, &[]).unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.unresolved, 0);
    }
}
