use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a reconciliation record. A single closed union;
/// there is deliberately no separate "validation" vs "verification"
/// flag pair next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Unresolved,
    Suggested,
    Verified,
    Linked,
    NotFound,
}

impl ResolutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Suggested => "suggested",
            Self::Verified => "verified",
            Self::Linked => "linked",
            Self::NotFound => "not_found",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unresolved" => Some(Self::Unresolved),
            "suggested" => Some(Self::Suggested),
            "verified" => Some(Self::Verified),
            "linked" => Some(Self::Linked),
            "not_found" => Some(Self::NotFound),
            _ => None,
        }
    }

    /// `linked` and `not_found` are terminal for the automated
    /// pipeline; only manual curation moves past them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Linked | Self::NotFound)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Unresolved => 0,
            Self::Suggested => 1,
            Self::Verified => 2,
            Self::NotFound => 3,
            Self::Linked => 4,
        }
    }

    /// Whether an explicit lifecycle advance to `next` is allowed.
    /// The lifecycle only moves forward: unresolved → suggested /
    /// verified / not_found → linked. From `not_found` the only
    /// remaining move is a manual link; from `linked` there is none.
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Linked, _) => false,
            (Self::NotFound, Self::Linked) => true,
            (Self::NotFound, _) => false,
            _ => next.rank() > self.rank(),
        }
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which matching phase produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Exact,
    Partial,
    Fuzzy,
    AuthorFuzzy,
}

impl MatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Partial => "partial",
            Self::Fuzzy => "fuzzy",
            Self::AuthorFuzzy => "author_fuzzy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "exact" => Some(Self::Exact),
            "partial" => Some(Self::Partial),
            "fuzzy" => Some(Self::Fuzzy),
            "author_fuzzy" => Some(Self::AuthorFuzzy),
            _ => None,
        }
    }
}

/// Composite key identifying one distinct mention. The author/title
/// parts are normalized so that re-transcriptions of the same mention
/// land on the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionKey {
    pub source_reference: String,
    pub author_norm: String,
    pub title_norm: String,
}

/// One stored reconciliation record per distinct mention key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionEntry {
    pub id: Uuid,
    pub key: ResolutionKey,
    pub status: ResolutionStatus,
    pub resolved_book_id: Option<Uuid>,
    pub resolved_critic_id: Option<Uuid>,
    pub match_phase: Option<MatchPhase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields carried by one idempotent upsert. The storage layer merges
/// these into an existing row without resetting lifecycle state.
#[derive(Debug, Clone, Default)]
pub struct ResolutionUpdate {
    pub status: Option<ResolutionStatus>,
    pub resolved_book_id: Option<Uuid>,
    pub resolved_critic_id: Option<Uuid>,
    pub match_phase: Option<MatchPhase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            ResolutionStatus::Unresolved,
            ResolutionStatus::Suggested,
            ResolutionStatus::Verified,
            ResolutionStatus::Linked,
            ResolutionStatus::NotFound,
        ] {
            assert_eq!(ResolutionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ResolutionStatus::parse("draft"), None);
    }

    #[test]
    fn lifecycle_only_moves_forward() {
        use ResolutionStatus::*;
        assert!(Unresolved.can_advance_to(Suggested));
        assert!(Unresolved.can_advance_to(NotFound));
        assert!(Suggested.can_advance_to(Verified));
        assert!(Suggested.can_advance_to(Linked));
        assert!(Verified.can_advance_to(Linked));

        assert!(!Verified.can_advance_to(Suggested));
        assert!(!Suggested.can_advance_to(Unresolved));
        // linked is final; not_found only accepts a manual link
        assert!(!Linked.can_advance_to(Verified));
        assert!(NotFound.can_advance_to(Linked));
        assert!(!NotFound.can_advance_to(Verified));
    }
}
