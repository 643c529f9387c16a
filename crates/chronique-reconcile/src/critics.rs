//! Critic name resolution. The roster is small and curated, so there
//! is deliberately no fuzzy phase: alternative spellings are stored
//! as explicit variants on the canonical record.

use chronique_core::CanonicalCritic;
use uuid::Uuid;

use crate::normalize::normalize;

pub struct CriticResolver;

impl CriticResolver {
    /// Exact normalized match against a critic's name or any stored
    /// variant; first match wins.
    pub fn resolve(critic_text: &str, candidates: &[CanonicalCritic]) -> Option<Uuid> {
        let needle = normalize(critic_text);
        if needle.is_empty() {
            return None;
        }

        candidates
            .iter()
            .find(|critic| {
                normalize(&critic.name) == needle
                    || critic.variants.iter().any(|v| normalize(v) == needle)
            })
            .map(|critic| critic.id)
    }
}
