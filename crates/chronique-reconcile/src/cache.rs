//! Pipeline-facing facade over the resolution cache table.

use chronique_core::{
    Database, MatchPhase, ResolutionEntry, ResolutionKey, ResolutionStatus, ResolutionUpdate,
};
use uuid::Uuid;

use crate::error::Result;

/// Thin wrapper enforcing the lifecycle vocabulary of the automated
/// pipeline: suggestions and not-found marks go through the idempotent
/// upsert, verification and linking through explicit advances.
pub struct ResolutionCache<'a> {
    db: &'a Database,
}

impl<'a> ResolutionCache<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a match suggestion for a mention key. Safe to repeat:
    /// the same key always lands on the same row, and an earlier
    /// suggestion's ids and `created_at` survive.
    pub fn suggest(
        &self,
        key: &ResolutionKey,
        book_id: Uuid,
        critic_id: Option<Uuid>,
        phase: MatchPhase,
    ) -> Result<Uuid> {
        let id = self.db.upsert_resolution(
            key,
            &ResolutionUpdate {
                status: Some(ResolutionStatus::Suggested),
                resolved_book_id: Some(book_id),
                resolved_critic_id: critic_id,
                match_phase: Some(phase),
            },
        )?;
        Ok(id)
    }

    /// Record that no phase could resolve the mention. The entry
    /// stays visible for manual curation instead of being dropped.
    pub fn mark_not_found(&self, key: &ResolutionKey, critic_id: Option<Uuid>) -> Result<Uuid> {
        let id = self.db.upsert_resolution(
            key,
            &ResolutionUpdate {
                status: Some(ResolutionStatus::NotFound),
                resolved_critic_id: critic_id,
                ..Default::default()
            },
        )?;
        Ok(id)
    }

    /// Human confirmation of a suggestion.
    pub fn verify(&self, entry_id: &Uuid) -> Result<ResolutionEntry> {
        let entry = self
            .db
            .advance_resolution(entry_id, ResolutionStatus::Verified, None, None)?;
        Ok(entry)
    }

    /// Final link to a canonical book; terminal for the pipeline.
    pub fn link(&self, entry_id: &Uuid, book_id: Uuid) -> Result<ResolutionEntry> {
        let entry =
            self.db
                .advance_resolution(entry_id, ResolutionStatus::Linked, Some(book_id), None)?;
        Ok(entry)
    }

    pub fn get(&self, key: &ResolutionKey) -> Result<Option<ResolutionEntry>> {
        Ok(self.db.get_resolution(key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(reference: &str) -> ResolutionKey {
        ResolutionKey {
            source_reference: reference.to_string(),
            author_norm: "anne sibran".to_string(),
            title_norm: "le grand jabadao".to_string(),
        }
    }

    #[test]
    fn suggest_then_link_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let cache = ResolutionCache::new(&db);
        let book_id = Uuid::now_v7();
        let k = key("ep-2025-05-10");

        let id = cache
            .suggest(&k, book_id, None, MatchPhase::Exact)
            .unwrap();
        let entry = cache.verify(&id).unwrap();
        assert_eq!(entry.status, ResolutionStatus::Verified);

        let entry = cache.link(&id, book_id).unwrap();
        assert_eq!(entry.status, ResolutionStatus::Linked);
        assert_eq!(entry.resolved_book_id, Some(book_id));

        // a later automated suggestion cannot pull it back
        cache
            .suggest(&k, Uuid::now_v7(), None, MatchPhase::Fuzzy)
            .unwrap();
        let entry = cache.get(&k).unwrap().unwrap();
        assert_eq!(entry.status, ResolutionStatus::Linked);
        assert_eq!(entry.resolved_book_id, Some(book_id));
    }

    #[test]
    fn not_found_stays_visible_until_manually_linked() {
        let db = Database::open_in_memory().unwrap();
        let cache = ResolutionCache::new(&db);
        let k = key("ep-2025-05-17");

        let id = cache.mark_not_found(&k, None).unwrap();
        assert_eq!(
            db.list_resolutions_by_status(ResolutionStatus::NotFound)
                .unwrap()
                .len(),
            1
        );

        // repeated runs do not multiply the row
        cache.mark_not_found(&k, None).unwrap();
        assert_eq!(
            db.list_resolutions_by_status(ResolutionStatus::NotFound)
                .unwrap()
                .len(),
            1
        );

        // an operator can still hand-link it
        let entry = cache.link(&id, Uuid::now_v7()).unwrap();
        assert_eq!(entry.status, ResolutionStatus::Linked);
    }
}
