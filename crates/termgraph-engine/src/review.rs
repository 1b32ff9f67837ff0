//! Merge reviews: concurrent-change detection between a branch and its
//! parent ahead of a rebase or promotion.
//!
//! A review compares the changes committed on each side since the child
//! branch forked and reports the concepts touched on both (the conflict
//! set). Reviews are computed in the background; callers poll until the
//! status settles. A review is pinned to the branch heads it saw at
//! creation, and any later commit on either branch makes it stale rather
//! than silently wrong.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use termgraph_types::{Concept, Description, RefsetMember, Relationship, SctId};

use crate::branch::{BranchStore, Timepoint};
use crate::error::{EngineError, EngineResult};
use crate::version::VersionedStore;

/// Identifier of a merge review.
pub type ReviewId = u64;

/// Lifecycle of a merge review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    /// The conflict computation is still running.
    Pending,
    /// Computation finished and both branch heads are unchanged since the
    /// review was requested.
    Current,
    /// A branch advanced after the review was requested; the conflict set
    /// may be wrong and must not be used.
    Stale,
    /// Computation failed.
    Failed,
}

/// One concept changed on both sides since the branches diverged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    /// The concept whose components were touched on both branches.
    pub concept_id: SctId,
    /// The concept record itself was deleted on the source branch.
    pub source_deleted: bool,
    /// The concept record itself was deleted on the target branch.
    pub target_deleted: bool,
}

/// A merge review and its outcome.
#[derive(Debug, Clone)]
pub struct MergeReview {
    /// Review identifier.
    pub id: ReviewId,
    /// Branch whose changes would be merged.
    pub source: String,
    /// Branch the changes would land on.
    pub target: String,
    /// Current lifecycle state.
    pub status: ReviewStatus,
    /// Source head at creation; used for staleness detection.
    pub source_head: Timepoint,
    /// Target head at creation; used for staleness detection.
    pub target_head: Timepoint,
    /// Concepts changed on both sides. Populated once `status` leaves
    /// `Pending`.
    pub conflicts: Vec<ConflictEntry>,
}

/// Shared registry of merge reviews.
///
/// Cloning shares the underlying map; the background computation thread
/// holds one clone and the caller another.
#[derive(Clone, Default)]
pub struct ReviewRegistry {
    reviews: Arc<RwLock<HashMap<ReviewId, MergeReview>>>,
    next_id: Arc<AtomicU64>,
}

impl ReviewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending review and returns its id.
    pub fn insert_pending(
        &self,
        source: &str,
        target: &str,
        source_head: Timepoint,
        target_head: Timepoint,
    ) -> ReviewId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.reviews.write().insert(
            id,
            MergeReview {
                id,
                source: source.to_string(),
                target: target.to_string(),
                status: ReviewStatus::Pending,
                source_head,
                target_head,
                conflicts: Vec::new(),
            },
        );
        id
    }

    /// Records the outcome of a finished computation.
    pub fn complete(&self, id: ReviewId, status: ReviewStatus, conflicts: Vec<ConflictEntry>) {
        if let Some(review) = self.reviews.write().get_mut(&id) {
            review.status = status;
            review.conflicts = conflicts;
        }
    }

    /// Downgrades a current review to stale. Pending reviews are left
    /// alone; the computation itself re-checks heads before completing.
    pub fn mark_stale(&self, id: ReviewId) {
        if let Some(review) = self.reviews.write().get_mut(&id) {
            if review.status == ReviewStatus::Current {
                review.status = ReviewStatus::Stale;
                tracing::debug!(review_id = id, "merge review became stale");
            }
        }
    }

    /// Returns a copy of the review.
    pub fn get(&self, id: ReviewId) -> EngineResult<MergeReview> {
        self.reviews
            .read()
            .get(&id)
            .cloned()
            .ok_or(EngineError::StaleReview { review_id: id })
    }
}

/// Resolves the fork point for a review between `source` and `target`.
///
/// One path must be an ancestor of the other; the divergence point is the
/// child branch's base timepoint, and changes on each side are those
/// committed on that branch's own path after it.
pub(crate) fn divergence_point(
    branches: &BranchStore,
    source: &str,
    target: &str,
) -> EngineResult<Timepoint> {
    let child = if is_ancestor_path(target, source) {
        source
    } else if is_ancestor_path(source, target) {
        target
    } else {
        return Err(EngineError::InvalidPath {
            path: format!("{} -> {}", source, target),
            reason: "review requires an ancestor/descendant branch pair".to_string(),
        });
    };
    Ok(branches.get(child)?.base)
}

fn is_ancestor_path(ancestor: &str, descendant: &str) -> bool {
    descendant.len() > ancestor.len()
        && descendant.starts_with(ancestor)
        && descendant.as_bytes()[ancestor.len()] == b'/'
}

/// Computes the conflict set between two branches.
///
/// A concept conflicts when any component it owns (the concept record, one
/// of its descriptions, a relationship it is the source of, or a
/// reference-set member pointing at it) changed on both branches after the
/// divergence point.
pub(crate) fn compute_conflicts(
    branches: &BranchStore,
    concepts: &VersionedStore<Concept>,
    descriptions: &VersionedStore<Description>,
    relationships: &VersionedStore<Relationship>,
    members: &VersionedStore<RefsetMember>,
    source: &str,
    target: &str,
) -> EngineResult<Vec<ConflictEntry>> {
    let since = divergence_point(branches, source, target)?;

    let changed_on = |path: &str| {
        let mut owners = concepts.changed_owners_on(path, since);
        owners.extend(descriptions.changed_owners_on(path, since));
        owners.extend(relationships.changed_owners_on(path, since));
        owners.extend(members.changed_owners_on(path, since));
        owners
    };
    let source_changed = changed_on(source);
    let target_changed = changed_on(target);

    let source_snapshot = branches.resolve_snapshot(source, None)?;
    let target_snapshot = branches.resolve_snapshot(target, None)?;

    let mut conflicts: Vec<ConflictEntry> = source_changed
        .intersection(&target_changed)
        .map(|&concept_id| {
            let deleted = |snapshot| {
                concepts
                    .visible_version(snapshot, concept_id)
                    .map_or(false, |version| version.data.is_none())
            };
            ConflictEntry {
                concept_id,
                source_deleted: deleted(&source_snapshot),
                target_deleted: deleted(&target_snapshot),
            }
        })
        .collect();
    conflicts.sort_by_key(|entry| entry.concept_id);
    Ok(conflicts)
}
