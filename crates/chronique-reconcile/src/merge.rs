//! Duplicate-group merging: validation, metadata refresh, reference
//! union, cascade and audit, plus the batch event stream.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use chronique_core::{Database, DuplicateGroup, MergeAuditRecord};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dedup::DuplicateDetector;
use crate::error::{ReconcileError, Result};
use crate::sources::CanonicalSource;

/// Summary of one successful merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub identity_key: String,
    pub primary_id: Uuid,
    pub deleted_ids: Vec<Uuid>,
    pub episode_ref_count: usize,
    pub review_ref_count: usize,
}

/// Events emitted by a batch merge. Tagged so a caller can adapt the
/// stream to SSE, a queue, or direct iteration unchanged.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeEvent {
    Progress {
        current: usize,
        total: usize,
    },
    GroupResult {
        identity_key: String,
        outcome: MergeOutcome,
    },
    Error {
        identity_key: String,
        message: String,
    },
    Complete {
        timestamp: DateTime<Utc>,
    },
}

pub struct MergeCoordinator {
    db: Arc<Mutex<Database>>,
    source: Arc<dyn CanonicalSource>,
}

impl MergeCoordinator {
    pub fn new(db: Arc<Mutex<Database>>, source: Arc<dyn CanonicalSource>) -> Self {
        Self { db, source }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().expect("database mutex poisoned")
    }

    pub fn find_groups(&self) -> Result<Vec<DuplicateGroup>> {
        DuplicateDetector::find_groups(&self.db())
    }

    /// Run the full merge protocol for one duplicate group.
    ///
    /// Validation failures leave the store untouched. A failed
    /// authoritative fetch falls back to the primary's local data.
    /// The metadata + merged-refs apply is a single atomic update, so
    /// a persistence failure can never leave the primary half-written.
    pub async fn merge_group(&self, group: &DuplicateGroup) -> Result<MergeOutcome> {
        // 1. validate
        let members = {
            let db = self.db();
            db.get_books(&group.member_ids)?
        };
        if members.is_empty() {
            return Err(ReconcileError::Validation {
                identity_key: group.identity_key.clone(),
                reason: "group has no members".to_string(),
            });
        }
        let author_id = members[0].author_id;
        if members.iter().any(|b| b.author_id != author_id) {
            return Err(ReconcileError::Validation {
                identity_key: group.identity_key.clone(),
                reason: "members do not share one author".to_string(),
            });
        }

        // 3. primary = earliest created_at, smallest id on a tie
        // (selected before the fetch so its data backs the fallback)
        let primary = members
            .iter()
            .min_by_key(|b| (b.created_at, b.id))
            .cloned()
            .ok_or_else(|| ReconcileError::Validation {
                identity_key: group.identity_key.clone(),
                reason: "group has no members".to_string(),
            })?;

        // 2. refresh canonical metadata, degrade to local on failure
        let title = self
            .source
            .fetch_title(&group.identity_key)
            .await
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| primary.title.clone());
        let publisher = self
            .source
            .fetch_publisher(&group.identity_key)
            .await
            .filter(|p| !p.trim().is_empty())
            .or_else(|| primary.publisher.clone());

        // 4. union the reference sets
        let mut episode_refs: BTreeSet<Uuid> = BTreeSet::new();
        let mut review_refs: BTreeSet<Uuid> = BTreeSet::new();
        for member in &members {
            episode_refs.extend(&member.episode_refs);
            review_refs.extend(&member.review_refs);
        }

        let deleted_ids: Vec<Uuid> = members
            .iter()
            .map(|b| b.id)
            .filter(|id| *id != primary.id)
            .collect();

        let mut updated = primary.clone();
        updated.title = title;
        updated.publisher = publisher;
        updated.episode_refs = episode_refs;
        updated.review_refs = review_refs;

        {
            let db = self.db();
            // 5. apply, 6. delete, 7. cascade
            db.update_book(&updated)?;
            db.delete_books(&deleted_ids)?;
            db.remove_author_book_refs(&author_id, &deleted_ids)?;

            // 8. audit is best-effort: steps 1-7 stand even if the
            // trail cannot be written
            let audit = MergeAuditRecord::new(
                group.identity_key.clone(),
                updated.id,
                deleted_ids.clone(),
                updated.episode_refs.len(),
                updated.review_refs.len(),
                updated.title.clone(),
                updated.publisher.clone(),
            );
            if let Err(err) = db.append_merge_audit(&audit) {
                tracing::warn!(
                    identity_key = %group.identity_key,
                    error = %err,
                    "merge audit write failed"
                );
            }
        }

        tracing::info!(
            identity_key = %group.identity_key,
            primary = %updated.id,
            deleted = deleted_ids.len(),
            "merged duplicate group"
        );

        Ok(MergeOutcome {
            identity_key: group.identity_key.clone(),
            primary_id: updated.id,
            deleted_ids,
            episode_ref_count: updated.episode_refs.len(),
            review_ref_count: updated.review_refs.len(),
        })
    }
}

/// Owns the single-flight batch state. Construct one per store; there
/// is intentionally no process-wide instance.
pub struct MergeSupervisor {
    coordinator: Arc<MergeCoordinator>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl MergeSupervisor {
    pub fn new(coordinator: MergeCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Takes effect at the next group boundary, never mid-merge.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Start a batch merge over all current duplicate groups, minus
    /// the skip list. At most one batch runs at a time. Groups are
    /// processed sequentially; every group's outcome is emitted and
    /// failed groups are not retried within the run.
    ///
    /// If the consumer drops the receiver, the in-flight group still
    /// completes (the merge happens before its events are offered);
    /// later groups are simply not attempted.
    pub fn start_batch(
        &self,
        skip: HashSet<String>,
    ) -> Result<mpsc::Receiver<MergeEvent>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ReconcileError::BatchInFlight);
        }
        self.stop_requested.store(false, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        let coordinator = Arc::clone(&self.coordinator);
        let running = Arc::clone(&self.running);
        let stop = Arc::clone(&self.stop_requested);

        tokio::spawn(async move {
            run_batch(coordinator, skip, stop, tx).await;
            running.store(false, Ordering::SeqCst);
        });

        Ok(rx)
    }
}

async fn run_batch(
    coordinator: Arc<MergeCoordinator>,
    skip: HashSet<String>,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<MergeEvent>,
) {
    let groups = match coordinator.find_groups() {
        Ok(groups) => groups,
        Err(err) => {
            tracing::warn!(error = %err, "duplicate scan failed, aborting batch");
            let _ = tx
                .send(MergeEvent::Complete {
                    timestamp: Utc::now(),
                })
                .await;
            return;
        }
    };

    let groups: Vec<DuplicateGroup> = groups
        .into_iter()
        .filter(|g| !skip.contains(&g.identity_key))
        .collect();
    let total = groups.len();

    for (index, group) in groups.iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            tracing::info!("stop requested, ending batch at group boundary");
            break;
        }
        if tx
            .send(MergeEvent::Progress {
                current: index + 1,
                total,
            })
            .await
            .is_err()
        {
            // consumer gone before this group started; nothing mutated
            break;
        }

        // the merge runs to completion before its result is offered,
        // so a vanishing consumer never tears a half-applied group
        let event = match coordinator.merge_group(group).await {
            Ok(outcome) => MergeEvent::GroupResult {
                identity_key: group.identity_key.clone(),
                outcome,
            },
            Err(err) => MergeEvent::Error {
                identity_key: group.identity_key.clone(),
                message: err.to_string(),
            },
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }

    let _ = tx
        .send(MergeEvent::Complete {
            timestamp: Utc::now(),
        })
        .await;
}
