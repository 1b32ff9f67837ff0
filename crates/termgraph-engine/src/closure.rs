//! Branch-scoped transitive closure over the is-a hierarchy.
//!
//! For every `(branch, form)` pair the index materializes each concept's
//! full ancestor set and the inverted descendant set, so reachability
//! queries are set unions over cached entries instead of per-query graph
//! traversal.
//!
//! ## Copy-on-write across branches
//!
//! Ancestor sets are stored behind `Arc`s. Creating a branch forks the
//! parent's closure by cloning the maps shallowly (pointer copies); a
//! later update on the child replaces or `Arc::make_mut`s only the entries
//! it touches, so a branch's recomputation never mutates an ancestor
//! branch's closure.
//!
//! ## Bounded recomputation
//!
//! A commit that adds or retires an is-a edge at concept X invalidates
//! exactly X and every Y with X in ancestors(Y). The rebuild recomputes
//! those concepts' ancestor sets with a memoized walk that reuses cached
//! sets for unaffected parents, detects cycles instead of looping, and is
//! applied all-or-nothing: on `CyclicHierarchy` the index is untouched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use termgraph_types::{Form, SctId};

use crate::error::{EngineError, EngineResult};

type ConceptSet = Arc<HashSet<SctId>>;

/// Materialized ancestor/descendant sets for one `(branch, form)` pair.
#[derive(Debug, Clone, Default)]
pub struct BranchClosure {
    ancestors: HashMap<SctId, ConceptSet>,
    descendants: HashMap<SctId, ConceptSet>,
}

impl BranchClosure {
    /// The cached ancestor set of a concept, excluding the concept itself.
    pub fn ancestors(&self, id: SctId) -> Option<&HashSet<SctId>> {
        self.ancestors.get(&id).map(|set| set.as_ref())
    }

    /// The cached descendant set of a concept, excluding the concept itself.
    pub fn descendants(&self, id: SctId) -> Option<&HashSet<SctId>> {
        self.descendants.get(&id).map(|set| set.as_ref())
    }
}

/// The closure index across all branches and both hierarchy forms.
#[derive(Debug, Default)]
pub struct ClosureIndex {
    branches: HashMap<(String, Form), BranchClosure>,
}

impl ClosureIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forks the parent branch's closure entries onto a new child branch.
    ///
    /// Cheap: the per-concept sets are shared via `Arc` until either side
    /// changes them.
    pub fn fork(&mut self, parent: &str, child: &str) {
        for form in [Form::Stated, Form::Inferred] {
            let cloned = self
                .branches
                .get(&(parent.to_string(), form))
                .cloned()
                .unwrap_or_default();
            self.branches.insert((child.to_string(), form), cloned);
        }
    }

    /// Returns the closure for a branch and form, if any commits built one.
    pub fn closure(&self, path: &str, form: Form) -> Option<&BranchClosure> {
        self.branches.get(&(path.to_string(), form))
    }

    /// Union of the ancestor sets of `ids` on a branch.
    ///
    /// The result never contains a queried id unless it is also a proper
    /// ancestor of another queried id.
    pub fn ancestors_of(&self, path: &str, form: Form, ids: &[SctId]) -> HashSet<SctId> {
        let mut result = HashSet::new();
        if let Some(closure) = self.closure(path, form) {
            for id in ids {
                if let Some(set) = closure.ancestors(*id) {
                    result.extend(set.iter().copied());
                }
            }
        }
        result
    }

    /// Union of the descendant sets of `ids` on a branch.
    pub fn descendants_of(&self, path: &str, form: Form, ids: &[SctId]) -> HashSet<SctId> {
        let mut result = HashSet::new();
        if let Some(closure) = self.closure(path, form) {
            for id in ids {
                if let Some(set) = closure.descendants(*id) {
                    result.extend(set.iter().copied());
                }
            }
        }
        result
    }

    /// Copy of one branch entry, for commit rollback journaling.
    pub(crate) fn entry_snapshot(&self, path: &str, form: Form) -> Option<BranchClosure> {
        self.branches.get(&(path.to_string(), form)).cloned()
    }

    /// Restores an entry captured by [`ClosureIndex::entry_snapshot`].
    pub(crate) fn restore_entry(&mut self, path: &str, form: Form, entry: Option<BranchClosure>) {
        match entry {
            Some(entry) => {
                self.branches.insert((path.to_string(), form), entry);
            }
            None => {
                self.branches.remove(&(path.to_string(), form));
            }
        }
    }

    /// Recomputes closure entries after is-a edges changed at `roots`.
    ///
    /// `parents_of` must report the *current* active is-a parents of a
    /// concept as visible on the branch (the staged, post-commit view).
    /// The affected set is each root plus its currently indexed
    /// descendants; nothing outside it is recomputed. Returns the number
    /// of updated entries.
    ///
    /// Fails with [`EngineError::CyclicHierarchy`] if the staged graph is
    /// cyclic, in which case no entry has been modified.
    pub fn apply_hierarchy_change<F>(
        &mut self,
        path: &str,
        form: Form,
        roots: &[SctId],
        parents_of: F,
    ) -> EngineResult<usize>
    where
        F: Fn(SctId) -> Vec<SctId>,
    {
        let closure = self
            .branches
            .entry((path.to_string(), form))
            .or_default();

        let mut affected: HashSet<SctId> = roots.iter().copied().collect();
        for root in roots {
            if let Some(descendants) = closure.descendants.get(root) {
                affected.extend(descendants.iter().copied());
            }
        }

        // Phase 1: compute every new ancestor set without touching the index.
        let mut memo: HashMap<SctId, Option<ConceptSet>> = HashMap::new();
        for &id in &affected {
            compute_ancestors(id, path, closure, &affected, &parents_of, &mut memo)?;
        }

        // Phase 2: apply. Only reached when the whole recompute succeeded.
        let mut updated = 0;
        for &id in &affected {
            let new_set = match memo.get(&id) {
                Some(Some(set)) => set.clone(),
                _ => continue,
            };
            let old_set = closure.ancestors.get(&id).cloned();
            if old_set.as_deref() == Some(new_set.as_ref()) {
                continue;
            }

            if let Some(old) = &old_set {
                for ancestor in old.iter() {
                    if !new_set.contains(ancestor) {
                        if let Some(descendants) = closure.descendants.get_mut(ancestor) {
                            Arc::make_mut(descendants).remove(&id);
                        }
                    }
                }
            }
            for ancestor in new_set.iter() {
                if old_set.as_ref().map_or(true, |old| !old.contains(ancestor)) {
                    let descendants = closure.descendants.entry(*ancestor).or_default();
                    Arc::make_mut(descendants).insert(id);
                }
            }
            closure.ancestors.insert(id, new_set);
            updated += 1;
        }

        tracing::debug!(
            branch = path,
            ?form,
            affected = affected.len(),
            updated,
            "closure rebuild applied"
        );
        Ok(updated)
    }
}

/// Memoized ancestor computation. `None` in the memo marks a concept whose
/// computation is in progress; revisiting one means the graph is cyclic.
fn compute_ancestors<F>(
    id: SctId,
    path: &str,
    closure: &BranchClosure,
    affected: &HashSet<SctId>,
    parents_of: &F,
    memo: &mut HashMap<SctId, Option<ConceptSet>>,
) -> EngineResult<ConceptSet>
where
    F: Fn(SctId) -> Vec<SctId>,
{
    if let Some(entry) = memo.get(&id) {
        return match entry {
            Some(set) => Ok(set.clone()),
            None => Err(EngineError::CyclicHierarchy {
                concept_id: id,
                path: path.to_string(),
            }),
        };
    }

    // Unaffected concepts with a cached set keep it verbatim.
    if !affected.contains(&id) {
        if let Some(cached) = closure.ancestors.get(&id) {
            memo.insert(id, Some(cached.clone()));
            return Ok(cached.clone());
        }
    }

    memo.insert(id, None);
    let mut set = HashSet::new();
    for parent in parents_of(id) {
        set.insert(parent);
        let parent_ancestors =
            compute_ancestors(parent, path, closure, affected, parents_of, memo)?;
        set.extend(parent_ancestors.iter().copied());
    }
    if set.contains(&id) {
        return Err(EngineError::CyclicHierarchy {
            concept_id: id,
            path: path.to_string(),
        });
    }

    let set = Arc::new(set);
    memo.insert(id, Some(set.clone()));
    Ok(set)
}
