//! Copy-on-write versioned component storage.
//!
//! Every component (concept, description, relationship, reference-set
//! member) is stored
//! as an arena of version rows with explicit start/end timepoints and an
//! owning branch path. Edits never mutate in place: committing a change on
//! a branch closes that branch's open version (if any) and appends a new
//! one scoped to the branch, leaving ancestor branches' versions untouched.
//! Deletions append a tombstone row with no payload.
//!
//! Visibility walks a [`BranchSnapshot`]'s levels most-specific-first; the
//! first level owning a version for a component masks all later levels.

use std::collections::{HashMap, HashSet};

use termgraph_types::{Concept, Description, RefsetMember, Relationship, SctId};

use crate::branch::{BranchSnapshot, Timepoint};

/// A component kind storable in a [`VersionedStore`].
pub trait Component: Clone {
    /// The component's own identifier.
    fn component_id(&self) -> SctId;

    /// The top-level concept this component belongs to. Merge-review
    /// conflict granularity is per owner concept, not per component.
    fn owner_id(&self) -> SctId;
}

impl Component for Concept {
    fn component_id(&self) -> SctId {
        self.id
    }
    fn owner_id(&self) -> SctId {
        self.id
    }
}

impl Component for Description {
    fn component_id(&self) -> SctId {
        self.id
    }
    fn owner_id(&self) -> SctId {
        self.concept_id
    }
}

impl Component for Relationship {
    fn component_id(&self) -> SctId {
        self.id
    }
    fn owner_id(&self) -> SctId {
        self.source_id
    }
}

impl Component for RefsetMember {
    fn component_id(&self) -> SctId {
        self.id
    }
    fn owner_id(&self) -> SctId {
        self.referenced_component_id
    }
}

/// One version row of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersion<T> {
    /// The branch this version was committed on.
    pub path: String,
    /// Commit timepoint at which this version became visible.
    pub start: Timepoint,
    /// Timepoint at which this version was superseded on its own branch.
    /// `None` means the version is currently open.
    pub end: Option<Timepoint>,
    /// The payload. `None` marks a deletion (tombstone).
    pub data: Option<T>,
    /// Owner concept id, kept on the row so tombstones still know their
    /// owner.
    pub owner: SctId,
}

impl<T> ComponentVersion<T> {
    fn visible_at(&self, path: &str, cutoff: Timepoint) -> bool {
        self.path == path
            && self.start <= cutoff
            && self.end.map_or(true, |end| end > cutoff)
    }
}

/// Arena of component versions indexed by component id.
#[derive(Debug, Clone)]
pub struct VersionedStore<T> {
    versions: HashMap<SctId, Vec<ComponentVersion<T>>>,
}

impl<T> Default for VersionedStore<T> {
    fn default() -> Self {
        Self {
            versions: HashMap::new(),
        }
    }
}

impl<T: Component> VersionedStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits a new version of a component on a branch.
    ///
    /// Closes the branch's previously open version of the same component,
    /// if any. Versions owned by other branches are not touched.
    pub fn upsert(&mut self, path: &str, timepoint: Timepoint, value: T) {
        let id = value.component_id();
        let owner = value.owner_id();
        let rows = self.versions.entry(id).or_default();
        close_open_version(rows, path, timepoint);
        rows.push(ComponentVersion {
            path: path.to_string(),
            start: timepoint,
            end: None,
            data: Some(value),
            owner,
        });
    }

    /// Deletes a component on a branch by appending a tombstone.
    ///
    /// The tombstone masks versions inherited from ancestor branches; on
    /// the parent the component stays visible. Returns false if the
    /// component has no versions at all.
    pub fn delete(&mut self, path: &str, timepoint: Timepoint, id: SctId) -> bool {
        let Some(rows) = self.versions.get_mut(&id) else {
            return false;
        };
        let owner = rows
            .iter()
            .rev()
            .map(|v| v.owner)
            .next()
            .unwrap_or(id);
        close_open_version(rows, path, timepoint);
        rows.push(ComponentVersion {
            path: path.to_string(),
            start: timepoint,
            end: None,
            data: None,
            owner,
        });
        true
    }

    /// Returns the version row visible under a snapshot, tombstones
    /// included.
    pub fn visible_version(
        &self,
        snapshot: &BranchSnapshot,
        id: SctId,
    ) -> Option<&ComponentVersion<T>> {
        let rows = self.versions.get(&id)?;
        for level in &snapshot.levels {
            let found = rows
                .iter()
                .filter(|v| v.visible_at(&level.path, level.cutoff))
                .max_by_key(|v| v.start);
            if let Some(version) = found {
                return Some(version);
            }
        }
        None
    }

    /// Returns the component payload visible under a snapshot, or `None`
    /// if absent or deleted at that point.
    pub fn visible(&self, snapshot: &BranchSnapshot, id: SctId) -> Option<&T> {
        self.visible_version(snapshot, id).and_then(|v| v.data.as_ref())
    }

    /// Iterates every component payload visible under a snapshot.
    pub fn iter_visible<'a>(
        &'a self,
        snapshot: &'a BranchSnapshot,
    ) -> impl Iterator<Item = &'a T> + 'a {
        self.versions
            .keys()
            .filter_map(move |id| self.visible(snapshot, *id))
    }

    /// Owner concept ids touched on `path` strictly after `since`.
    ///
    /// Both new versions and tombstones count; this feeds merge review.
    pub fn changed_owners_on(&self, path: &str, since: Timepoint) -> HashSet<SctId> {
        let mut owners = HashSet::new();
        for rows in self.versions.values() {
            for version in rows {
                if version.path == path && version.start > since {
                    owners.insert(version.owner);
                }
            }
        }
        owners
    }

    /// Total number of version rows held (all branches, all history).
    pub fn version_count(&self) -> usize {
        self.versions.values().map(|v| v.len()).sum()
    }

    /// Removes and returns all version rows for a component. Used with
    /// [`VersionedStore::restore_rows`] to roll back a failed commit.
    pub(crate) fn take_rows(&mut self, id: SctId) -> Option<Vec<ComponentVersion<T>>> {
        self.versions.remove(&id)
    }

    /// Restores version rows captured by [`VersionedStore::take_rows`].
    pub(crate) fn restore_rows(&mut self, id: SctId, rows: Option<Vec<ComponentVersion<T>>>) {
        match rows {
            Some(rows) => {
                self.versions.insert(id, rows);
            }
            None => {
                self.versions.remove(&id);
            }
        }
    }

    /// Snapshot of a component's rows, for rollback journaling.
    pub(crate) fn rows_of(&self, id: SctId) -> Option<Vec<ComponentVersion<T>>> {
        self.versions.get(&id).cloned()
    }
}

fn close_open_version<T>(rows: &mut [ComponentVersion<T>], path: &str, timepoint: Timepoint) {
    for version in rows.iter_mut() {
        if version.path == path && version.end.is_none() {
            version.end = Some(timepoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchStore;
    use termgraph_types::{well_known, DefinitionOrigin};

    fn make_concept(id: SctId) -> Concept {
        Concept {
            id,
            active: true,
            module_id: well_known::CORE_MODULE,
            origin: DefinitionOrigin::Statement,
        }
    }

    fn setup() -> (BranchStore, VersionedStore<Concept>) {
        let mut branches = BranchStore::new();
        branches.create("MAIN").unwrap();
        (branches, VersionedStore::new())
    }

    #[test]
    fn test_upsert_and_visibility() {
        let (mut branches, mut store) = setup();
        let t1 = branches.next_timepoint();
        store.upsert("MAIN", t1, make_concept(100));
        branches.advance_head("MAIN", t1).unwrap();

        let snapshot = branches.resolve_snapshot("MAIN", None).unwrap();
        assert_eq!(store.visible(&snapshot, 100).unwrap().id, 100);
        assert!(store.visible(&snapshot, 200).is_none());
    }

    #[test]
    fn test_historical_timepoint_hides_later_versions() {
        let (mut branches, mut store) = setup();
        let before = branches.next_timepoint();
        let t1 = branches.next_timepoint();
        store.upsert("MAIN", t1, make_concept(100));
        branches.advance_head("MAIN", t1).unwrap();

        let old = branches.resolve_snapshot("MAIN", Some(before)).unwrap();
        assert!(store.visible(&old, 100).is_none());
    }

    #[test]
    fn test_child_inherits_parent_content() {
        let (mut branches, mut store) = setup();
        let t1 = branches.next_timepoint();
        store.upsert("MAIN", t1, make_concept(100));
        branches.advance_head("MAIN", t1).unwrap();
        branches.create("MAIN/A").unwrap();

        let snapshot = branches.resolve_snapshot("MAIN/A", None).unwrap();
        assert_eq!(store.visible(&snapshot, 100).unwrap().id, 100);
    }

    #[test]
    fn test_parent_commit_after_fork_invisible_to_child() {
        let (mut branches, mut store) = setup();
        branches.create("MAIN/A").unwrap();

        let t2 = branches.next_timepoint();
        store.upsert("MAIN", t2, make_concept(100));
        branches.advance_head("MAIN", t2).unwrap();

        let child = branches.resolve_snapshot("MAIN/A", None).unwrap();
        assert!(store.visible(&child, 100).is_none());

        let main = branches.resolve_snapshot("MAIN", None).unwrap();
        assert!(store.visible(&main, 100).is_some());
    }

    #[test]
    fn test_child_edit_masks_parent_version() {
        let (mut branches, mut store) = setup();
        let t1 = branches.next_timepoint();
        store.upsert("MAIN", t1, make_concept(100));
        branches.advance_head("MAIN", t1).unwrap();
        branches.create("MAIN/A").unwrap();

        let t2 = branches.next_timepoint();
        let mut edited = make_concept(100);
        edited.active = false;
        store.upsert("MAIN/A", t2, edited);
        branches.advance_head("MAIN/A", t2).unwrap();

        let child = branches.resolve_snapshot("MAIN/A", None).unwrap();
        assert!(!store.visible(&child, 100).unwrap().active);

        // Copy-on-write: the parent still sees its own version.
        let main = branches.resolve_snapshot("MAIN", None).unwrap();
        assert!(store.visible(&main, 100).unwrap().active);
    }

    #[test]
    fn test_tombstone_masks_inherited_version() {
        let (mut branches, mut store) = setup();
        let t1 = branches.next_timepoint();
        store.upsert("MAIN", t1, make_concept(100));
        branches.advance_head("MAIN", t1).unwrap();
        branches.create("MAIN/A").unwrap();

        let t2 = branches.next_timepoint();
        assert!(store.delete("MAIN/A", t2, 100));
        branches.advance_head("MAIN/A", t2).unwrap();

        let child = branches.resolve_snapshot("MAIN/A", None).unwrap();
        assert!(store.visible(&child, 100).is_none());
        // The tombstone row itself is findable.
        assert!(store.visible_version(&child, 100).unwrap().data.is_none());

        let main = branches.resolve_snapshot("MAIN", None).unwrap();
        assert!(store.visible(&main, 100).is_some());
    }

    #[test]
    fn test_one_open_version_per_branch() {
        let (mut branches, mut store) = setup();
        let t1 = branches.next_timepoint();
        store.upsert("MAIN", t1, make_concept(100));
        let t2 = branches.next_timepoint();
        store.upsert("MAIN", t2, make_concept(100));
        branches.advance_head("MAIN", t2).unwrap();

        let open = store
            .rows_of(100)
            .unwrap()
            .into_iter()
            .filter(|v| v.end.is_none())
            .count();
        assert_eq!(open, 1);

        // The superseded version is still reachable historically.
        let old = branches.resolve_snapshot("MAIN", Some(t1)).unwrap();
        assert!(store.visible(&old, 100).is_some());
    }

    #[test]
    fn test_changed_owners_on() {
        let (mut branches, mut store) = setup();
        let fork = branches.next_timepoint();

        let t1 = branches.next_timepoint();
        store.upsert("MAIN", t1, make_concept(100));
        let t2 = branches.next_timepoint();
        store.delete("MAIN", t2, 100);
        branches.advance_head("MAIN", t2).unwrap();

        let changed = store.changed_owners_on("MAIN", fork);
        assert_eq!(changed, HashSet::from([100]));
        assert!(store.changed_owners_on("MAIN", t2).is_empty());
    }

    #[test]
    fn test_relationship_owner_is_source() {
        use termgraph_types::Form;
        let rel = Relationship {
            id: 5,
            active: true,
            module_id: well_known::CORE_MODULE,
            source_id: 100,
            destination_id: 200,
            type_id: well_known::IS_A,
            group: 0,
            form: Form::Inferred,
        };
        assert_eq!(rel.owner_id(), 100);
        assert_eq!(rel.component_id(), 5);
    }

    #[test]
    fn test_description_owner_is_concept() {
        let description = Description {
            id: 7,
            active: true,
            module_id: well_known::CORE_MODULE,
            concept_id: 100,
            term: "Heart disease".to_string(),
            type_id: well_known::SYNONYM,
            lang: "en".to_string(),
        };
        assert_eq!(description.owner_id(), 100);
        assert_eq!(description.component_id(), 7);
    }
}
