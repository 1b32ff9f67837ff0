//! Branch tree, visibility snapshots, and the advisory commit lock.
//!
//! Branches form a tree rooted at `MAIN`, addressed by slash-delimited
//! paths (`MAIN/A/B`). Each branch records the timepoint it forked from its
//! parent (`base`) and the timepoint of its last commit (`head`). A query
//! against a branch resolves to a [`BranchSnapshot`]: the ordered list of
//! `(path, cutoff)` pairs used to judge component-version visibility, most
//! specific first.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{EngineError, EngineResult};

/// Epoch milliseconds. Timepoints issued by a [`BranchStore`] are strictly
/// monotonic even when the wall clock stalls within a millisecond.
pub type Timepoint = u64;

/// Path of the root branch.
pub const MAIN: &str = "MAIN";

/// A branch in the version-control tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Slash-delimited tree position, e.g. `MAIN/PROJECT/TASK`.
    pub path: String,
    /// Timepoint at which this branch forked from its parent.
    pub base: Timepoint,
    /// Timepoint of the last commit on this branch.
    pub head: Timepoint,
    /// Advisory lock flag; set while a commit is in flight.
    pub locked: bool,
}

impl Branch {
    /// Returns the parent path, or `None` for the root branch.
    pub fn parent_path(&self) -> Option<&str> {
        parent_of(&self.path)
    }
}

/// One level of a resolved snapshot: a branch path and the visibility
/// cutoff applied at that level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLevel {
    /// The branch path contributing versions at this level.
    pub path: String,
    /// Versions on this path are visible iff they started at or before
    /// this timepoint and had not ended by it.
    pub cutoff: Timepoint,
}

/// An immutable description of what is visible on a branch at a timepoint.
///
/// Levels are ordered most-specific first: a version owned by an earlier
/// level masks versions of the same component owned by later levels.
/// Queries evaluated against the same snapshot always see the same data,
/// which is what gives readers snapshot isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSnapshot {
    /// Visibility levels, the queried branch first, root last.
    pub levels: Vec<SnapshotLevel>,
}

impl BranchSnapshot {
    /// The path of the branch this snapshot was resolved for.
    pub fn branch_path(&self) -> &str {
        &self.levels[0].path
    }
}

/// In-memory store of the branch tree.
///
/// # Example
///
/// ```
/// use termgraph_engine::branch::BranchStore;
///
/// let mut branches = BranchStore::new();
/// branches.create("MAIN").unwrap();
/// branches.create("MAIN/A").unwrap();
///
/// let snapshot = branches.resolve_snapshot("MAIN/A", None).unwrap();
/// assert_eq!(snapshot.branch_path(), "MAIN/A");
/// assert_eq!(snapshot.levels.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct BranchStore {
    branches: HashMap<String, Branch>,
    clock: Timepoint,
}

impl BranchStore {
    /// Creates an empty branch store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next timepoint, strictly greater than any issued before.
    pub fn next_timepoint(&mut self) -> Timepoint {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.clock = wall.max(self.clock + 1);
        self.clock
    }

    /// Creates a branch. The root `MAIN` needs no parent; any other path
    /// requires its parent branch to exist already.
    ///
    /// Returns the new branch's base timepoint.
    pub fn create(&mut self, path: &str) -> EngineResult<Timepoint> {
        validate_path(path)?;
        if self.branches.contains_key(path) {
            return Err(EngineError::InvalidPath {
                path: path.to_string(),
                reason: "branch already exists".to_string(),
            });
        }
        if let Some(parent) = parent_of(path) {
            if !self.branches.contains_key(parent) {
                return Err(EngineError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("parent branch '{}' does not exist", parent),
                });
            }
        }

        let base = self.next_timepoint();
        self.branches.insert(
            path.to_string(),
            Branch {
                path: path.to_string(),
                base,
                head: base,
                locked: false,
            },
        );
        Ok(base)
    }

    /// Returns the branch at `path`.
    pub fn get(&self, path: &str) -> EngineResult<&Branch> {
        self.branches.get(path).ok_or_else(|| EngineError::BranchNotFound {
            path: path.to_string(),
        })
    }

    /// Returns true if the branch exists.
    pub fn exists(&self, path: &str) -> bool {
        self.branches.contains_key(path)
    }

    /// Resolves a branch path (plus optional historical timepoint) to a
    /// visibility snapshot.
    ///
    /// The queried branch contributes its head (or the pinned timepoint) as
    /// cutoff; each ancestor contributes at most the base timepoint of the
    /// branch that forked from it, so content committed to an ancestor
    /// after the fork stays invisible until a rebase.
    pub fn resolve_snapshot(
        &self,
        path: &str,
        timepoint: Option<Timepoint>,
    ) -> EngineResult<BranchSnapshot> {
        let mut branch = self.get(path)?;
        let mut cutoff = timepoint.unwrap_or(branch.head);
        let mut levels = Vec::new();

        loop {
            levels.push(SnapshotLevel {
                path: branch.path.clone(),
                cutoff,
            });
            match branch.parent_path() {
                Some(parent) => {
                    cutoff = cutoff.min(branch.base);
                    branch = self.get(parent)?;
                }
                None => break,
            }
        }

        Ok(BranchSnapshot { levels })
    }

    /// Builds the snapshot a commit in flight on `path` would see, with the
    /// branch-level cutoff forced to the staged commit timepoint.
    pub(crate) fn staged_snapshot(
        &self,
        path: &str,
        staged: Timepoint,
    ) -> EngineResult<BranchSnapshot> {
        self.resolve_snapshot(path, Some(staged))
    }

    /// Moves the branch head forward after a commit.
    ///
    /// Fails with `ConcurrentModification` while the branch lock is held.
    pub fn advance_head(&mut self, path: &str, timepoint: Timepoint) -> EngineResult<()> {
        let branch = self.get_mut(path)?;
        if branch.locked {
            return Err(EngineError::ConcurrentModification {
                path: path.to_string(),
            });
        }
        branch.head = branch.head.max(timepoint);
        Ok(())
    }

    /// Takes the advisory commit lock.
    ///
    /// A second lock attempt fails with `ConcurrentModification` rather
    /// than blocking; writes are serialized per branch, never globally.
    pub fn lock(&mut self, path: &str) -> EngineResult<()> {
        let branch = self.get_mut(path)?;
        if branch.locked {
            return Err(EngineError::ConcurrentModification {
                path: path.to_string(),
            });
        }
        branch.locked = true;
        Ok(())
    }

    /// Releases the advisory commit lock.
    pub fn unlock(&mut self, path: &str) -> EngineResult<()> {
        let branch = self.get_mut(path)?;
        branch.locked = false;
        Ok(())
    }

    fn get_mut(&mut self, path: &str) -> EngineResult<&mut Branch> {
        self.branches.get_mut(path).ok_or_else(|| EngineError::BranchNotFound {
            path: path.to_string(),
        })
    }
}

/// Parses a branch URI of the form `path` or `path@epochMillis`.
///
/// # Examples
///
/// ```
/// use termgraph_engine::branch::parse_branch_uri;
///
/// assert_eq!(parse_branch_uri("MAIN/A").unwrap(), ("MAIN/A".to_string(), None));
/// assert_eq!(
///     parse_branch_uri("MAIN/A@1700000000000").unwrap(),
///     ("MAIN/A".to_string(), Some(1700000000000))
/// );
/// ```
pub fn parse_branch_uri(uri: &str) -> EngineResult<(String, Option<Timepoint>)> {
    match uri.split_once('@') {
        None => Ok((uri.to_string(), None)),
        Some((path, millis)) => {
            let timepoint = millis.parse::<Timepoint>().map_err(|_| EngineError::InvalidPath {
                path: uri.to_string(),
                reason: format!("invalid timepoint suffix '{}'", millis),
            })?;
            Ok((path.to_string(), Some(timepoint)))
        }
    }
}

/// Returns the parent of a branch path, or `None` for the root.
pub fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

fn validate_path(path: &str) -> EngineResult<()> {
    let invalid = |reason: &str| EngineError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = path.split('/');
    if segments.next() != Some(MAIN) {
        return Err(invalid("path must be rooted at MAIN"));
    }
    for segment in segments {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        if !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(invalid("segments may contain only letters, digits, '-' and '_'"));
        }
    }
    Ok(())
}
