//! The `GraphStore` facade: branches, component stores, closure index and
//! merge reviews behind one shared handle.
//!
//! All state sits behind a single `RwLock`, so a query resolves its
//! [`BranchSnapshot`] and evaluates against a consistent view, and a commit
//! is atomic from any reader's perspective. Writes additionally take the
//! per-branch advisory lock; two commits to different branches contend only
//! on the store lock, never on each other's branch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;

use termgraph_types::{Concept, Description, Form, RefsetMember, Relationship, SctId};

use crate::branch::{parse_branch_uri, parent_of, BranchStore, Timepoint, MAIN};
use crate::closure::ClosureIndex;
use crate::ecl::{evaluate, parse_ecl, EclNode, EclPage, EvalContext, Page};
use crate::error::{EngineError, EngineResult};
use crate::mrcm::{MrcmRegistry, MrcmRules};
use crate::review::{
    compute_conflicts, divergence_point, ConflictEntry, MergeReview, ReviewId, ReviewRegistry,
    ReviewStatus,
};
use crate::version::{Component, VersionedStore};

/// A batch of component changes applied to one branch in one commit.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    /// Concepts to create or update.
    pub concepts: Vec<Concept>,
    /// Descriptions to create or update.
    pub descriptions: Vec<Description>,
    /// Relationships to create or update.
    pub relationships: Vec<Relationship>,
    /// Reference-set members to create or update.
    pub members: Vec<RefsetMember>,
    /// Concept ids to delete.
    pub delete_concepts: Vec<SctId>,
    /// Description ids to delete.
    pub delete_descriptions: Vec<SctId>,
    /// Relationship ids to delete.
    pub delete_relationships: Vec<SctId>,
    /// Reference-set member ids to delete.
    pub delete_members: Vec<SctId>,
}

impl Commit {
    /// An empty commit.
    pub fn new() -> Self {
        Self::default()
    }
}

struct Inner {
    branches: BranchStore,
    concepts: VersionedStore<Concept>,
    descriptions: VersionedStore<Description>,
    relationships: VersionedStore<Relationship>,
    members: VersionedStore<RefsetMember>,
    closure: ClosureIndex,
}

/// Compiled-query cache limit; hitting it drops the cache wholesale and
/// lets queries re-compile on demand.
const ECL_CACHE_CAPACITY: usize = 1024;

/// Shared handle to the whole terminology graph.
///
/// Cheap to clone; clones share state.
///
/// # Example
///
/// ```
/// use termgraph_engine::store::{Commit, GraphStore};
/// use termgraph_types::{well_known, Concept, DefinitionOrigin, Form};
///
/// let store = GraphStore::new();
/// let mut commit = Commit::new();
/// commit.concepts.push(Concept {
///     id: well_known::ROOT,
///     active: true,
///     module_id: well_known::CORE_MODULE,
///     origin: DefinitionOrigin::Statement,
/// });
/// store.commit("MAIN", commit).unwrap();
///
/// let page = store
///     .select_concept_ids("*", "MAIN", Form::Inferred, None, None)
///     .unwrap();
/// assert_eq!(page.ids, vec![well_known::ROOT]);
/// ```
#[derive(Clone)]
pub struct GraphStore {
    inner: Arc<RwLock<Inner>>,
    reviews: ReviewRegistry,
    mrcm: Arc<MrcmRegistry>,
    ecl_cache: Arc<RwLock<HashMap<String, Arc<EclNode>>>>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// Creates a store containing only the empty root branch.
    pub fn new() -> Self {
        let mut branches = BranchStore::new();
        // Creating the root in an empty store cannot fail.
        let _ = branches.create(MAIN);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                branches,
                concepts: VersionedStore::new(),
                descriptions: VersionedStore::new(),
                relationships: VersionedStore::new(),
                members: VersionedStore::new(),
                closure: ClosureIndex::new(),
            })),
            reviews: ReviewRegistry::new(),
            mrcm: Arc::new(MrcmRegistry::new()),
            ecl_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a branch under an existing parent, forking the parent's
    /// closure. Returns the new branch's base timepoint.
    pub fn create_branch(&self, path: &str) -> EngineResult<Timepoint> {
        let mut inner = self.inner.write();
        let base = inner.branches.create(path)?;
        if let Some(parent) = parent_of(path) {
            let parent = parent.to_string();
            inner.closure.fork(&parent, path);
        }
        tracing::info!(branch = path, base, "branch created");
        Ok(base)
    }

    /// Applies a commit to a branch.
    ///
    /// Takes the branch's advisory lock for the duration (a concurrent
    /// commit to the same branch fails with `ConcurrentModification`
    /// instead of queueing), applies the component changes copy-on-write,
    /// recomputes the affected closure entries, and advances the branch
    /// head. A `CyclicHierarchy` failure rolls every staged change back.
    pub fn commit(&self, path: &str, commit: Commit) -> EngineResult<Timepoint> {
        let mut guard = self.inner.write();
        guard.branches.lock(path)?;
        let result = apply_commit(&mut *guard, path, &commit);
        // The advisory lock is released on both outcomes; failure paths
        // have already rolled their changes back.
        let _ = guard.branches.unlock(path);
        let timepoint = result?;
        guard.branches.advance_head(path, timepoint)?;
        tracing::info!(
            branch = path,
            timepoint,
            upserts = commit.concepts.len()
                + commit.descriptions.len()
                + commit.relationships.len()
                + commit.members.len(),
            deletes = commit.delete_concepts.len()
                + commit.delete_descriptions.len()
                + commit.delete_relationships.len()
                + commit.delete_members.len(),
            "commit applied"
        );
        Ok(timepoint)
    }

    /// Evaluates a constraint expression against a branch.
    ///
    /// `branch_uri` is `path` or `path@epochMillis` for a historical view.
    /// `id_filter` restricts the result to the given ids; `page` windows
    /// the sorted output. Compiled expressions are cached by exact query
    /// text.
    pub fn select_concept_ids(
        &self,
        ecl: &str,
        branch_uri: &str,
        form: Form,
        id_filter: Option<&HashSet<SctId>>,
        page: Option<Page>,
    ) -> EngineResult<EclPage> {
        let node = self.compile(ecl)?;
        let (path, timepoint) = parse_branch_uri(branch_uri)?;

        let inner = self.inner.read();
        let snapshot = inner.branches.resolve_snapshot(&path, timepoint)?;
        let ctx = EvalContext {
            snapshot: &snapshot,
            form,
            concepts: &inner.concepts,
            relationships: &inner.relationships,
            members: &inner.members,
            closure: &inner.closure,
            // The closure only reflects branch heads; explicit timepoints
            // traverse the snapshot's is-a edges instead.
            pinned: timepoint.is_some(),
        };
        evaluate(&node, &ctx, id_filter, page)
    }

    /// Union of the ancestor sets of `ids` on a branch.
    pub fn ancestors_of(&self, path: &str, form: Form, ids: &[SctId]) -> HashSet<SctId> {
        self.inner.read().closure.ancestors_of(path, form, ids)
    }

    /// Union of the descendant sets of `ids` on a branch.
    pub fn descendants_of(&self, path: &str, form: Form, ids: &[SctId]) -> HashSet<SctId> {
        self.inner.read().closure.descendants_of(path, form, ids)
    }

    /// The concept visible on a branch, if present and not deleted.
    pub fn concept(&self, branch_uri: &str, id: SctId) -> EngineResult<Option<Concept>> {
        let (path, timepoint) = parse_branch_uri(branch_uri)?;
        let inner = self.inner.read();
        let snapshot = inner.branches.resolve_snapshot(&path, timepoint)?;
        Ok(inner.concepts.visible(&snapshot, id).cloned())
    }

    /// Descriptions of a concept visible on a branch, sorted by id.
    pub fn descriptions(&self, branch_uri: &str, concept_id: SctId) -> EngineResult<Vec<Description>> {
        let (path, timepoint) = parse_branch_uri(branch_uri)?;
        let inner = self.inner.read();
        let snapshot = inner.branches.resolve_snapshot(&path, timepoint)?;
        let mut descriptions: Vec<Description> = inner
            .descriptions
            .iter_visible(&snapshot)
            .filter(|description| description.concept_id == concept_id)
            .cloned()
            .collect();
        descriptions.sort_by_key(|description| description.id);
        Ok(descriptions)
    }

    /// Takes a branch's advisory lock.
    pub fn lock_branch(&self, path: &str) -> EngineResult<()> {
        self.inner.write().branches.lock(path)
    }

    /// Releases a branch's advisory lock.
    pub fn unlock_branch(&self, path: &str) -> EngineResult<()> {
        self.inner.write().branches.unlock(path)
    }

    /// Starts a merge review between two branches and returns its id.
    ///
    /// One path must be an ancestor of the other. The conflict set is
    /// computed on a background thread; poll [`GraphStore::get_merge_review`]
    /// until the status leaves `Pending`.
    pub fn create_merge_review(&self, source: &str, target: &str) -> EngineResult<ReviewId> {
        let (source_head, target_head) = {
            let inner = self.inner.read();
            divergence_point(&inner.branches, source, target)?;
            (
                inner.branches.get(source)?.head,
                inner.branches.get(target)?.head,
            )
        };
        let id = self
            .reviews
            .insert_pending(source, target, source_head, target_head);
        tracing::info!(review_id = id, source, target, "merge review started");

        let inner = Arc::clone(&self.inner);
        let reviews = self.reviews.clone();
        let source = source.to_string();
        let target = target.to_string();
        thread::spawn(move || {
            let guard = inner.read();
            let outcome = compute_conflicts(
                &guard.branches,
                &guard.concepts,
                &guard.descriptions,
                &guard.relationships,
                &guard.members,
                &source,
                &target,
            );
            // Re-fetch the heads under the same read guard: a commit that
            // lands after this point marks the review stale via polling.
            let heads_unchanged = guard
                .branches
                .get(&source)
                .and_then(|s| guard.branches.get(&target).map(|t| (s.head, t.head)))
                .map_or(false, |heads| heads == (source_head, target_head));
            drop(guard);

            match outcome {
                Ok(conflicts) => {
                    let status = if heads_unchanged {
                        ReviewStatus::Current
                    } else {
                        ReviewStatus::Stale
                    };
                    reviews.complete(id, status, conflicts);
                }
                Err(error) => {
                    tracing::warn!(review_id = id, %error, "merge review failed");
                    reviews.complete(id, ReviewStatus::Failed, Vec::new());
                }
            }
        });
        Ok(id)
    }

    /// Returns a merge review, downgrading it to `Stale` first if either
    /// branch advanced since the review was created.
    pub fn get_merge_review(&self, id: ReviewId) -> EngineResult<MergeReview> {
        let review = self.reviews.get(id)?;
        let inner = self.inner.read();
        let source_head = inner.branches.get(&review.source)?.head;
        let target_head = inner.branches.get(&review.target)?.head;
        drop(inner);
        if (source_head, target_head) != (review.source_head, review.target_head) {
            self.reviews.mark_stale(id);
        }
        self.reviews.get(id)
    }

    /// The conflict set of a review that is still current.
    pub fn merge_review_conflicts(&self, id: ReviewId) -> EngineResult<Vec<ConflictEntry>> {
        let review = self.get_merge_review(id)?;
        if review.status == ReviewStatus::Current {
            Ok(review.conflicts)
        } else {
            Err(EngineError::StaleReview { review_id: id })
        }
    }

    /// Loads concept-model rules for a branch path.
    pub fn load_mrcm_rules(&self, path: &str, rules: MrcmRules) {
        self.mrcm.load(path, rules);
    }

    /// Concept-model rules applicable on a branch (nearest ancestor match).
    pub fn mrcm_rules(&self, path: &str) -> Option<Arc<MrcmRules>> {
        self.mrcm.rules_for_branch(path)
    }

    fn compile(&self, ecl: &str) -> EngineResult<Arc<EclNode>> {
        if let Some(node) = self.ecl_cache.read().get(ecl) {
            return Ok(node.clone());
        }
        let node = Arc::new(parse_ecl(ecl)?);
        let mut cache = self.ecl_cache.write();
        if cache.len() >= ECL_CACHE_CAPACITY {
            cache.clear();
        }
        cache.entry(ecl.to_string()).or_insert_with(|| node.clone());
        Ok(node)
    }
}

/// Per-store rollback journal of the component rows a commit touches.
struct Journal {
    concepts: Vec<(SctId, Option<Vec<crate::version::ComponentVersion<Concept>>>)>,
    descriptions: Vec<(SctId, Option<Vec<crate::version::ComponentVersion<Description>>>)>,
    relationships: Vec<(SctId, Option<Vec<crate::version::ComponentVersion<Relationship>>>)>,
    members: Vec<(SctId, Option<Vec<crate::version::ComponentVersion<RefsetMember>>>)>,
}

fn journal_ids<T: Component>(
    store: &VersionedStore<T>,
    upserts: &[T],
    deletes: &[SctId],
) -> Vec<(SctId, Option<Vec<crate::version::ComponentVersion<T>>>)> {
    let ids: HashSet<SctId> = upserts
        .iter()
        .map(Component::component_id)
        .chain(deletes.iter().copied())
        .collect();
    ids.into_iter().map(|id| (id, store.rows_of(id))).collect()
}

/// The body of a commit, run while holding the branch's advisory lock.
/// On error every staged change has been rolled back.
fn apply_commit(inner: &mut Inner, path: &str, commit: &Commit) -> EngineResult<Timepoint> {
    let timepoint = inner.branches.next_timepoint();

    let journal = Journal {
        concepts: journal_ids(&inner.concepts, &commit.concepts, &commit.delete_concepts),
        descriptions: journal_ids(
            &inner.descriptions,
            &commit.descriptions,
            &commit.delete_descriptions,
        ),
        relationships: journal_ids(
            &inner.relationships,
            &commit.relationships,
            &commit.delete_relationships,
        ),
        members: journal_ids(&inner.members, &commit.members, &commit.delete_members),
    };

    // Hierarchy roots per form: sources of is-a rows added, changed or
    // deleted by this commit. Deleted rows are resolved against the
    // pre-commit view, before their tombstones land.
    let mut roots: HashMap<Form, HashSet<SctId>> = HashMap::new();
    for rel in &commit.relationships {
        if rel.is_is_a() {
            roots.entry(rel.form).or_default().insert(rel.source_id);
        }
    }
    {
        let before = inner.branches.resolve_snapshot(path, None)?;
        for id in &commit.delete_relationships {
            if let Some(rel) = inner.relationships.visible(&before, *id) {
                if rel.is_is_a() {
                    roots.entry(rel.form).or_default().insert(rel.source_id);
                }
            }
        }
    }

    for concept in &commit.concepts {
        inner.concepts.upsert(path, timepoint, concept.clone());
    }
    for description in &commit.descriptions {
        inner.descriptions.upsert(path, timepoint, description.clone());
    }
    for rel in &commit.relationships {
        inner.relationships.upsert(path, timepoint, rel.clone());
    }
    for member in &commit.members {
        inner.members.upsert(path, timepoint, member.clone());
    }
    for id in &commit.delete_concepts {
        inner.concepts.delete(path, timepoint, *id);
    }
    for id in &commit.delete_descriptions {
        inner.descriptions.delete(path, timepoint, *id);
    }
    for id in &commit.delete_relationships {
        inner.relationships.delete(path, timepoint, *id);
    }
    for id in &commit.delete_members {
        inner.members.delete(path, timepoint, *id);
    }

    if let Err(error) = rebuild_closure(inner, path, timepoint, &roots) {
        rollback(inner, journal);
        return Err(error);
    }
    Ok(timepoint)
}

fn rebuild_closure(
    inner: &mut Inner,
    path: &str,
    timepoint: Timepoint,
    roots: &HashMap<Form, HashSet<SctId>>,
) -> EngineResult<()> {
    if roots.is_empty() {
        return Ok(());
    }
    let staged = inner.branches.staged_snapshot(path, timepoint)?;
    let Inner {
        relationships,
        closure,
        ..
    } = inner;

    // Saved entries let a second-form failure undo a first-form success.
    let saved: Vec<(Form, Option<_>)> = roots
        .keys()
        .map(|form| (*form, closure.entry_snapshot(path, *form)))
        .collect();

    let mut result = Ok(());
    for (form, form_roots) in roots {
        let mut parents: HashMap<SctId, Vec<SctId>> = HashMap::new();
        for rel in relationships.iter_visible(&staged) {
            if rel.active && rel.form == *form && rel.is_is_a() {
                parents.entry(rel.source_id).or_default().push(rel.destination_id);
            }
        }
        let form_roots: Vec<SctId> = form_roots.iter().copied().collect();
        if let Err(error) = closure.apply_hierarchy_change(path, *form, &form_roots, move |id| {
            parents.get(&id).cloned().unwrap_or_default()
        }) {
            result = Err(error);
            break;
        }
    }

    if result.is_err() {
        for (form, entry) in saved {
            closure.restore_entry(path, form, entry);
        }
    }
    result
}

fn rollback(inner: &mut Inner, journal: Journal) {
    for (id, rows) in journal.concepts {
        inner.concepts.restore_rows(id, rows);
    }
    for (id, rows) in journal.descriptions {
        inner.descriptions.restore_rows(id, rows);
    }
    for (id, rows) in journal.relationships {
        inner.relationships.restore_rows(id, rows);
    }
    for (id, rows) in journal.members {
        inner.members.restore_rows(id, rows);
    }
}
