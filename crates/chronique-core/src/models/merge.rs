use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Books sharing one identity key. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub identity_key: String,
    pub member_ids: Vec<Uuid>,
}

impl DuplicateGroup {
    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }
}

/// Append-only audit trail entry written after a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeAuditRecord {
    pub id: Uuid,
    pub identity_key: String,
    pub primary_id: Uuid,
    pub deleted_ids: Vec<Uuid>,
    pub merged_episode_count: usize,
    pub merged_review_count: usize,
    /// Canonical metadata as applied to the primary, after the
    /// authoritative-source refresh (or local fallback).
    pub canonical_title: String,
    pub canonical_publisher: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MergeAuditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity_key: impl Into<String>,
        primary_id: Uuid,
        deleted_ids: Vec<Uuid>,
        merged_episode_count: usize,
        merged_review_count: usize,
        canonical_title: impl Into<String>,
        canonical_publisher: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            identity_key: identity_key.into(),
            primary_id,
            deleted_ids,
            merged_episode_count,
            merged_review_count,
            canonical_title: canonical_title.into(),
            canonical_publisher,
            created_at: Utc::now(),
        }
    }
}
