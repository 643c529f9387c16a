//! Four-phase resolution of a noisy (title, author) mention against
//! canonical books.

use chronique_core::{MatchPhase, MatchingConfig, Mention};
use uuid::Uuid;

use crate::normalize::{match_pattern, normalize, search_pattern};

/// Minimum normalized length before fuzzy scoring kicks in; very
/// short titles produce spurious high similarity ratios.
const MIN_FUZZY_LEN: usize = 5;

#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub book_id: Uuid,
    pub title: String,
    pub author_name: String,
}

struct PreparedCandidate<'a> {
    candidate: &'a MatchCandidate,
    title_norm: String,
    author_norm: String,
}

#[derive(Debug, Clone)]
pub struct MatchingEngine {
    fuzzy_threshold: f64,
    combined_threshold: f64,
    title_weight: f64,
    author_weight: f64,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl MatchingEngine {
    pub fn new(cfg: &MatchingConfig) -> Self {
        Self {
            fuzzy_threshold: cfg.fuzzy_threshold,
            combined_threshold: cfg.combined_threshold,
            title_weight: cfg.title_weight,
            author_weight: cfg.author_weight,
        }
    }

    /// Resolve one mention. Phases run in order and the first hit
    /// wins; a mention no phase accepts yields `None`, which is not
    /// an error — it stays behind for manual curation.
    pub fn resolve(
        &self,
        title_text: &str,
        author_text: &str,
        candidates: &[MatchCandidate],
    ) -> Option<(Uuid, MatchPhase)> {
        let title_norm = normalize(title_text);
        if title_norm.is_empty() {
            return None;
        }
        let author_norm = normalize(author_text);

        let prepared: Vec<PreparedCandidate> = candidates
            .iter()
            .map(|candidate| PreparedCandidate {
                candidate,
                title_norm: normalize(&candidate.title),
                author_norm: normalize(&candidate.author_name),
            })
            .collect();

        self.phase_exact(&title_norm, title_text, &author_norm, &prepared)
            .map(|id| (id, MatchPhase::Exact))
            .or_else(|| {
                self.phase_partial(&title_norm, title_text, &author_norm, &prepared)
                    .map(|id| (id, MatchPhase::Partial))
            })
            .or_else(|| {
                self.phase_fuzzy(&title_norm, &prepared)
                    .map(|id| (id, MatchPhase::Fuzzy))
            })
            .or_else(|| {
                self.phase_author_fuzzy(&title_norm, &author_norm, &prepared)
                    .map(|id| (id, MatchPhase::AuthorFuzzy))
            })
    }

    /// Resolve a whole extraction run. Each mention goes through the
    /// phases independently; candidates are never consumed, since
    /// several mentions may legitimately point at the same book.
    pub fn resolve_batch(
        &self,
        mentions: &[Mention],
        candidates: &[MatchCandidate],
    ) -> Vec<Option<(Uuid, MatchPhase)>> {
        mentions
            .iter()
            .map(|m| self.resolve(&m.title_text, &m.author_text, candidates))
            .collect()
    }

    /// An empty extracted author counts as agreement; upstream often
    /// drops the author entirely rather than misspell it.
    fn authors_agree(author_norm: &str, candidate_author_norm: &str) -> bool {
        author_norm.is_empty() || author_norm == candidate_author_norm
    }

    /// Phase 1: normalized equality (typography-insensitive), author
    /// in exact agreement. Ties go to the first candidate in store
    /// iteration order.
    fn phase_exact(
        &self,
        title_norm: &str,
        title_text: &str,
        author_norm: &str,
        candidates: &[PreparedCandidate],
    ) -> Option<Uuid> {
        let pattern = match_pattern(title_text);
        candidates
            .iter()
            .find(|c| {
                (c.title_norm == title_norm || pattern.is_match(&c.title_norm))
                    && Self::authors_agree(author_norm, &c.author_norm)
            })
            .map(|c| c.candidate.book_id)
    }

    /// Phase 2: truncated/subtitle-dropped extractions — the mention
    /// title appears inside the candidate title.
    fn phase_partial(
        &self,
        title_norm: &str,
        title_text: &str,
        author_norm: &str,
        candidates: &[PreparedCandidate],
    ) -> Option<Uuid> {
        let pattern = search_pattern(title_text);
        candidates
            .iter()
            .find(|c| {
                (c.title_norm.contains(title_norm) || pattern.is_match(&c.title_norm))
                    && Self::authors_agree(author_norm, &c.author_norm)
            })
            .map(|c| c.candidate.book_id)
    }

    /// Phase 3: edit-distance ratio on titles alone. Tie-break:
    /// highest score, then shortest candidate title.
    fn phase_fuzzy(&self, title_norm: &str, candidates: &[PreparedCandidate]) -> Option<Uuid> {
        if title_norm.len() < MIN_FUZZY_LEN {
            return None;
        }

        let mut best: Option<(f64, &PreparedCandidate)> = None;
        for c in candidates {
            if c.title_norm.len() < MIN_FUZZY_LEN {
                continue;
            }
            let score = strsim::normalized_levenshtein(title_norm, &c.title_norm);
            if score < self.fuzzy_threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_c)) => {
                    score > best_score
                        || (score == best_score && c.title_norm.len() < best_c.title_norm.len())
                }
            };
            if better {
                best = Some((score, c));
            }
        }
        best.map(|(_, c)| c.candidate.book_id)
    }

    /// Phase 4: both title and author carry independent noise;
    /// a weighted combination against a more lenient threshold.
    fn phase_author_fuzzy(
        &self,
        title_norm: &str,
        author_norm: &str,
        candidates: &[PreparedCandidate],
    ) -> Option<Uuid> {
        if title_norm.len() < MIN_FUZZY_LEN || author_norm.is_empty() {
            return None;
        }

        let mut best: Option<(f64, &PreparedCandidate)> = None;
        for c in candidates {
            if c.title_norm.len() < MIN_FUZZY_LEN || c.author_norm.is_empty() {
                continue;
            }
            let title_sim = strsim::normalized_levenshtein(title_norm, &c.title_norm);
            let author_sim = strsim::normalized_levenshtein(author_norm, &c.author_norm);
            let combined = self.title_weight * title_sim + self.author_weight * author_sim;
            if combined < self.combined_threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_c)) => {
                    combined > best_score
                        || (combined == best_score
                            && c.title_norm.len() < best_c.title_norm.len())
                }
            };
            if better {
                best = Some((combined, c));
            }
        }
        best.map(|(_, c)| c.candidate.book_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronique_core::MentionSection;

    fn candidate(title: &str, author: &str) -> MatchCandidate {
        MatchCandidate {
            book_id: Uuid::now_v7(),
            title: title.to_string(),
            author_name: author.to_string(),
        }
    }

    #[test]
    fn exact_phase_beats_fuzzy() {
        let engine = MatchingEngine::default();
        let candidates = vec![candidate("Le Grand Jabadao", "Anne Sibran")];

        let (id, phase) = engine
            .resolve("le grand jabadao", "Anne Sibran", &candidates)
            .unwrap();
        assert_eq!(id, candidates[0].book_id);
        assert_eq!(phase, MatchPhase::Exact);
    }

    #[test]
    fn exact_phase_is_typography_insensitive() {
        let engine = MatchingEngine::default();
        let candidates = vec![candidate("L'Œuvre au noir", "Marguerite Yourcenar")];

        let (_, phase) = engine
            .resolve("l oeuvre au noir", "Marguerite Yourcenar", &candidates)
            .unwrap();
        assert_eq!(phase, MatchPhase::Exact);
    }

    #[test]
    fn noisy_author_forces_fuzzy_phase() {
        let engine = MatchingEngine::default();
        let candidates = vec![candidate("Le Bon Frère", "Chris Offutt")];

        // the title matches exactly, yet the misspelled author must
        // keep phases 1 and 2 from accepting
        let (id, phase) = engine
            .resolve("Le Bon Frère", "Chris Hoffut", &candidates)
            .unwrap();
        assert_eq!(id, candidates[0].book_id);
        assert!(matches!(phase, MatchPhase::Fuzzy | MatchPhase::AuthorFuzzy));
    }

    #[test]
    fn truncated_title_resolves_before_unassisted_fuzzy_gives_up() {
        let engine = MatchingEngine::default();
        let candidates = vec![candidate(
            "Trilogie de Helsinki : Le livre rouge des ruptures",
            "Pirkko Saisio",
        )];

        let (id, phase) = engine
            .resolve("Le Livre rouge des ruptures", "Pirkko Saisio", &candidates)
            .unwrap();
        assert_eq!(id, candidates[0].book_id);
        assert!(matches!(
            phase,
            MatchPhase::Partial | MatchPhase::Fuzzy | MatchPhase::AuthorFuzzy
        ));
    }

    #[test]
    fn single_typo_in_title_is_tolerated() {
        let engine = MatchingEngine::default();
        let candidates = vec![candidate("Réparer les vivants", "Maylis de Kerangal")];

        let (_, phase) = engine
            .resolve("Réparer les vivant", "Maylis de Kerangal", &candidates)
            .unwrap();
        // singular/plural drift is substring containment, not equality
        assert!(matches!(phase, MatchPhase::Partial | MatchPhase::Fuzzy));
    }

    #[test]
    fn unrelated_title_stays_unresolved() {
        let engine = MatchingEngine::default();
        let candidates = vec![
            candidate("Le Grand Jabadao", "Anne Sibran"),
            candidate("Réparer les vivants", "Maylis de Kerangal"),
        ];

        assert!(
            engine
                .resolve("Les Misérables", "Victor Hugo", &candidates)
                .is_none()
        );
    }

    #[test]
    fn exact_tie_goes_to_first_candidate() {
        let engine = MatchingEngine::default();
        let candidates = vec![
            candidate("Chanson douce", "Leïla Slimani"),
            candidate("Chanson douce", "Leïla Slimani"),
        ];

        let (id, _) = engine
            .resolve("Chanson douce", "Leïla Slimani", &candidates)
            .unwrap();
        assert_eq!(id, candidates[0].book_id);
    }

    #[test]
    fn fuzzy_tie_prefers_shorter_candidate_title() {
        let engine = MatchingEngine::default();
        // both differ from the mention by exactly one trailing char
        let long = candidate("Chanson douce xx", "A");
        let short = candidate("Chanson douce x", "A");
        let candidates = vec![long, short];

        let (id, phase) = engine.resolve("Chanson douce x!", "B", &candidates).unwrap();
        assert_eq!(phase, MatchPhase::Fuzzy);
        assert_eq!(id, candidates[1].book_id);
    }

    #[test]
    fn empty_mention_author_counts_as_agreement() {
        let engine = MatchingEngine::default();
        let candidates = vec![candidate("Chanson douce", "Leïla Slimani")];

        let (_, phase) = engine.resolve("Chanson douce", "", &candidates).unwrap();
        assert_eq!(phase, MatchPhase::Exact);
    }

    #[test]
    fn batch_resolution_reuses_candidates() {
        let engine = MatchingEngine::default();
        let candidates = vec![candidate("Chanson douce", "Leïla Slimani")];

        let mentions = vec![
            Mention::new(
                "ep-1",
                MentionSection::Programme,
                "Chanson douce",
                "Leïla Slimani",
                "",
            ),
            Mention::new(
                "ep-2",
                MentionSection::Highlight,
                "chanson douce",
                "Leila Slimani",
                "",
            ),
            Mention::new("ep-2", MentionSection::Programme, "Inconnu", "Personne", ""),
        ];

        let results = engine.resolve_batch(&mentions, &candidates);
        assert_eq!(results.len(), 3);
        // two mentions may point at the same canonical book
        assert_eq!(results[0].unwrap().0, candidates[0].book_id);
        assert_eq!(results[1].unwrap().0, candidates[0].book_id);
        assert!(results[2].is_none());
    }
}
