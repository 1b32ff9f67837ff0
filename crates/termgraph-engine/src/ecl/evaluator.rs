//! Set-oriented evaluation of constraint expressions.
//!
//! Evaluation is lazy about the universe: `*` and other all-concept
//! results are carried as a symbolic [`SetResult::All`] and only
//! materialized when an operator genuinely needs the full id set. Focus
//! sets reach through the [`ClosureIndex`], so hierarchy operators are
//! cache unions rather than graph walks; queries pinned to a historical
//! timepoint traverse the snapshot's is-a edges directly instead, since
//! the closure only describes branch heads.

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

use termgraph_types::{Cardinality, Concept, DefinitionOrigin, Form, RefsetMember, Relationship, SctId};

use crate::branch::BranchSnapshot;
use crate::closure::ClosureIndex;
use crate::ecl::ast::{AttributeConstraint, EclNode, ReachMode, RefinementItem};
use crate::error::{EngineError, EngineResult};
use crate::version::VersionedStore;

/// Recursion limit; deeper expressions fail with `EvaluationError` rather
/// than exhausting the stack.
const MAX_DEPTH: usize = 64;

/// Pagination window over a sorted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Number of leading ids to skip.
    pub offset: usize,
    /// Maximum number of ids to return.
    pub limit: usize,
}

/// One page of evaluation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EclPage {
    /// Matching concept ids in ascending order, windowed by the request's
    /// [`Page`].
    pub ids: Vec<SctId>,
    /// Total number of matches before pagination.
    pub total: usize,
}

/// Everything evaluation reads: one snapshot's view of the component
/// stores plus the closure index. All queries against the same context see
/// the same data.
pub struct EvalContext<'a> {
    /// The resolved visibility snapshot.
    pub snapshot: &'a BranchSnapshot,
    /// Which relationship form drives hierarchy and refinement matching.
    pub form: Form,
    /// Concept store.
    pub concepts: &'a VersionedStore<Concept>,
    /// Relationship store.
    pub relationships: &'a VersionedStore<Relationship>,
    /// Reference-set member store.
    pub members: &'a VersionedStore<RefsetMember>,
    /// Transitive closure index.
    pub closure: &'a ClosureIndex,
    /// True when the snapshot is pinned to an explicit historical
    /// timepoint. The closure index only describes branch heads, so
    /// hierarchy operators then traverse the is-a edges visible under the
    /// snapshot instead.
    pub pinned: bool,
}

/// A concept set that may be the whole universe, kept symbolic so `*` in
/// attribute values and intersections never forces a full scan.
enum SetResult {
    All,
    Ids(HashSet<SctId>),
}

impl SetResult {
    fn contains(&self, id: SctId) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(&id),
        }
    }
}

/// Evaluates a parsed expression against a context.
///
/// `id_filter`, when present, restricts the result to the given ids before
/// the total is counted. The returned ids are sorted ascending; `page`
/// windows them after sorting, so the same request always pages the same
/// ordering.
pub fn evaluate(
    node: &EclNode,
    ctx: &EvalContext<'_>,
    id_filter: Option<&HashSet<SctId>>,
    page: Option<Page>,
) -> EngineResult<EclPage> {
    let evaluator = Evaluator {
        ctx,
        attributes: OnceCell::new(),
        hierarchy: OnceCell::new(),
        universe: OnceCell::new(),
    };
    let result = evaluator.eval(node, 0)?;
    let ids = evaluator.materialize(result);

    // Reported results are concepts: ids that appear only as attribute
    // types, refset ids or dangling references are dropped here, as are
    // inactive concepts, keeping every result a subset of `*`.
    let mut ids: Vec<SctId> = ids
        .into_iter()
        .filter(|id| id_filter.map_or(true, |filter| filter.contains(id)))
        .filter(|id| evaluator.is_active_concept(*id))
        .collect();
    ids.sort_unstable();

    let total = ids.len();
    let ids = match page {
        Some(page) => ids.into_iter().skip(page.offset).take(page.limit).collect(),
        None => ids,
    };
    Ok(EclPage { ids, total })
}

struct Evaluator<'a> {
    ctx: &'a EvalContext<'a>,
    /// Non-is-a active relationships of the requested form, by source
    /// concept. Built on first refinement or dotted step.
    attributes: OnceCell<HashMap<SctId, Vec<&'a Relationship>>>,
    /// Is-a adjacency visible under the snapshot. Built only for pinned
    /// historical queries, which cannot use the branch-head closure.
    hierarchy: OnceCell<Hierarchy>,
    /// Active concept ids visible under the snapshot. Built only when a
    /// symbolic `All` must be materialized.
    universe: OnceCell<HashSet<SctId>>,
}

/// Is-a edges of one snapshot, indexed both ways.
#[derive(Default)]
struct Hierarchy {
    parents: HashMap<SctId, Vec<SctId>>,
    children: HashMap<SctId, Vec<SctId>>,
}

/// Everything reachable from `start` by following `adjacency`, excluding
/// `start` itself. The visited set doubles as a cycle guard.
fn transitive(adjacency: &HashMap<SctId, Vec<SctId>>, start: SctId) -> HashSet<SctId> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if let Some(nexts) = adjacency.get(&id) {
            for next in nexts {
                if seen.insert(*next) {
                    stack.push(*next);
                }
            }
        }
    }
    seen
}

/// One attribute constraint with both sides pre-evaluated, so the
/// per-candidate check is pure set membership.
struct ResolvedConstraint {
    cardinality: Option<Cardinality>,
    types: SetResult,
    values: SetResult,
}

/// A refinement item with its constraints resolved.
enum ResolvedItem {
    Attribute(ResolvedConstraint),
    Group {
        cardinality: Option<Cardinality>,
        constraints: Vec<ResolvedConstraint>,
    },
}

impl<'a> Evaluator<'a> {
    fn eval(&self, node: &EclNode, depth: usize) -> EngineResult<SetResult> {
        if depth > MAX_DEPTH {
            return Err(EngineError::EvaluationError {
                fragment: node.to_string(),
                message: format!("expression nesting exceeds {} levels", MAX_DEPTH),
            });
        }

        match node {
            EclNode::Wildcard => Ok(SetResult::All),
            EclNode::ConceptRef { mode, id, .. } => Ok(SetResult::Ids(self.reach(*mode, *id))),
            EclNode::MemberOf(inner) => {
                let refsets = self.eval(inner, depth + 1)?;
                Ok(SetResult::Ids(self.members_of(&refsets)))
            }
            EclNode::And(items) => self.eval_and(items, depth),
            EclNode::Or(items) => self.eval_or(items, depth),
            EclNode::Minus(left, right) => {
                let left = self.eval(left, depth + 1)?;
                let right = self.eval(right, depth + 1)?;
                let mut ids = self.materialize(left);
                match right {
                    SetResult::All => ids.clear(),
                    SetResult::Ids(excluded) => ids.retain(|id| !excluded.contains(id)),
                }
                Ok(SetResult::Ids(ids))
            }
            EclNode::Refined { focus, refinement } => {
                let candidates = self.materialize(self.eval(focus, depth + 1)?);
                let resolved: Vec<ResolvedItem> = refinement
                    .items
                    .iter()
                    .map(|item| self.resolve_item(item, depth))
                    .collect::<EngineResult<_>>()?;
                Ok(SetResult::Ids(self.filter_refined(candidates, &resolved)))
            }
            EclNode::Dotted { focus, attribute } => {
                let sources = self.materialize(self.eval(focus, depth + 1)?);
                let types = self.eval(attribute, depth + 1)?;
                let attributes = self.attribute_index();
                let mut destinations = HashSet::new();
                for source in sources {
                    if let Some(rels) = attributes.get(&source) {
                        for rel in rels {
                            if types.contains(rel.type_id) {
                                destinations.insert(rel.destination_id);
                            }
                        }
                    }
                }
                Ok(SetResult::Ids(destinations))
            }
        }
    }

    fn eval_and(&self, items: &[EclNode], depth: usize) -> EngineResult<SetResult> {
        let mut sets = Vec::new();
        for item in items {
            match self.eval(item, depth + 1)? {
                SetResult::All => {} // identity for intersection
                SetResult::Ids(ids) => sets.push(ids),
            }
        }
        if sets.is_empty() {
            return Ok(SetResult::All);
        }
        // Intersect starting from the smallest operand.
        sets.sort_by_key(|set| set.len());
        let mut iter = sets.into_iter();
        let mut result = iter.next().unwrap_or_default();
        for set in iter {
            result.retain(|id| set.contains(id));
            if result.is_empty() {
                break;
            }
        }
        Ok(SetResult::Ids(result))
    }

    fn eval_or(&self, items: &[EclNode], depth: usize) -> EngineResult<SetResult> {
        let mut result = HashSet::new();
        for item in items {
            match self.eval(item, depth + 1)? {
                SetResult::All => return Ok(SetResult::All),
                SetResult::Ids(ids) => result.extend(ids),
            }
        }
        Ok(SetResult::Ids(result))
    }

    /// Resolves a hierarchy operator applied to one concept id.
    ///
    /// An id denotes itself whether or not a concept record exists:
    /// attribute-type and refset positions routinely reference metadata
    /// concepts that are never committed. Unknown and inactive ids are
    /// filtered from final results by [`evaluate`], not here.
    fn reach(&self, mode: ReachMode, id: SctId) -> HashSet<SctId> {
        let mut ids = match mode {
            ReachMode::SelfOnly | ReachMode::DescendantOrSelf | ReachMode::AncestorOrSelf => {
                HashSet::from([id])
            }
            ReachMode::Descendant | ReachMode::Ancestor => HashSet::new(),
        };
        match mode {
            ReachMode::Descendant | ReachMode::DescendantOrSelf => {
                ids.extend(self.descendants(id));
            }
            ReachMode::Ancestor | ReachMode::AncestorOrSelf => {
                ids.extend(self.ancestors(id));
            }
            ReachMode::SelfOnly => {}
        }
        ids
    }

    fn descendants(&self, id: SctId) -> HashSet<SctId> {
        if self.ctx.pinned {
            transitive(&self.hierarchy().children, id)
        } else {
            let path = self.ctx.snapshot.branch_path();
            self.ctx.closure.descendants_of(path, self.ctx.form, &[id])
        }
    }

    fn ancestors(&self, id: SctId) -> HashSet<SctId> {
        if self.ctx.pinned {
            transitive(&self.hierarchy().parents, id)
        } else {
            let path = self.ctx.snapshot.branch_path();
            self.ctx.closure.ancestors_of(path, self.ctx.form, &[id])
        }
    }

    fn hierarchy(&self) -> &Hierarchy {
        self.hierarchy.get_or_init(|| {
            let mut hierarchy = Hierarchy::default();
            for rel in self.ctx.relationships.iter_visible(self.ctx.snapshot) {
                if rel.active && rel.form == self.ctx.form && rel.is_is_a() {
                    hierarchy
                        .parents
                        .entry(rel.source_id)
                        .or_default()
                        .push(rel.destination_id);
                    hierarchy
                        .children
                        .entry(rel.destination_id)
                        .or_default()
                        .push(rel.source_id);
                }
            }
            hierarchy
        })
    }

    fn is_active_concept(&self, id: SctId) -> bool {
        self.ctx
            .concepts
            .visible(self.ctx.snapshot, id)
            .map_or(false, |concept| concept.active)
    }

    /// Referenced components of active members whose refset is in `refsets`.
    fn members_of(&self, refsets: &SetResult) -> HashSet<SctId> {
        self.ctx
            .members
            .iter_visible(self.ctx.snapshot)
            .filter(|member| member.active && refsets.contains(member.refset_id))
            .map(|member| member.referenced_component_id)
            .collect()
    }

    fn resolve_item(&self, item: &RefinementItem, depth: usize) -> EngineResult<ResolvedItem> {
        match item {
            RefinementItem::Attribute(constraint) => {
                Ok(ResolvedItem::Attribute(self.resolve_constraint(constraint, depth)?))
            }
            RefinementItem::Group {
                cardinality,
                attributes,
            } => {
                let constraints = attributes
                    .iter()
                    .map(|constraint| self.resolve_constraint(constraint, depth))
                    .collect::<EngineResult<_>>()?;
                Ok(ResolvedItem::Group {
                    cardinality: *cardinality,
                    constraints,
                })
            }
        }
    }

    fn resolve_constraint(
        &self,
        constraint: &AttributeConstraint,
        depth: usize,
    ) -> EngineResult<ResolvedConstraint> {
        Ok(ResolvedConstraint {
            cardinality: constraint.cardinality,
            types: self.eval(&constraint.attribute, depth + 1)?,
            values: self.eval(&constraint.value, depth + 1)?,
        })
    }

    /// Keeps the candidates whose attributes satisfy every refinement item.
    fn filter_refined(&self, candidates: HashSet<SctId>, items: &[ResolvedItem]) -> HashSet<SctId> {
        let attributes = self.attribute_index();
        let ctx = self.ctx;
        let check = move |id: SctId| {
            let groups = grouped_attributes(ctx, attributes, id);
            items.iter().all(|item| item_matches(item, &groups))
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            let candidates: Vec<SctId> = candidates.into_iter().collect();
            candidates.into_par_iter().filter(|id| check(*id)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            candidates.into_iter().filter(|id| check(*id)).collect()
        }
    }

    fn attribute_index(&self) -> &HashMap<SctId, Vec<&'a Relationship>> {
        self.attributes.get_or_init(|| {
            let mut index: HashMap<SctId, Vec<&'a Relationship>> = HashMap::new();
            for rel in self.ctx.relationships.iter_visible(self.ctx.snapshot) {
                if rel.active && rel.form == self.ctx.form && !rel.is_is_a() {
                    index.entry(rel.source_id).or_default().push(rel);
                }
            }
            index
        })
    }

    fn universe(&self) -> &HashSet<SctId> {
        self.universe.get_or_init(|| {
            self.ctx
                .concepts
                .iter_visible(self.ctx.snapshot)
                .filter(|concept| concept.active)
                .map(|concept| concept.id)
                .collect()
        })
    }

    fn materialize(&self, result: SetResult) -> HashSet<SctId> {
        match result {
            SetResult::All => self.universe().clone(),
            SetResult::Ids(ids) => ids,
        }
    }
}

/// A concept's attribute relationships bucketed by group key.
///
/// Group 0 relationships of axiom-defined concepts are each their own
/// implicit group and get a unique synthetic key; group 0 of
/// statement-defined concepts stays at key 0, which group matching skips
/// (those attributes are genuinely ungrouped).
fn grouped_attributes(
    ctx: &EvalContext<'_>,
    attributes: &HashMap<SctId, Vec<&Relationship>>,
    id: SctId,
) -> HashMap<i64, Vec<(SctId, SctId)>> {
    let mut groups: HashMap<i64, Vec<(SctId, SctId)>> = HashMap::new();
    let Some(rels) = attributes.get(&id) else {
        return groups;
    };
    let self_grouped = ctx
        .concepts
        .visible(ctx.snapshot, id)
        .map_or(false, |concept| concept.origin == DefinitionOrigin::Axiom);
    let mut synthetic = -1i64;
    for rel in rels {
        let key = if rel.group == 0 && self_grouped {
            let key = synthetic;
            synthetic -= 1;
            key
        } else {
            i64::from(rel.group)
        };
        groups.entry(key).or_default().push((rel.type_id, rel.destination_id));
    }
    groups
}

/// Does one refinement item hold for a concept's grouped attributes?
fn item_matches(item: &ResolvedItem, groups: &HashMap<i64, Vec<(SctId, SctId)>>) -> bool {
    match item {
        ResolvedItem::Attribute(constraint) => {
            // Ungrouped matching counts across all groups, key 0 included.
            let count = groups
                .values()
                .flatten()
                .filter(|(type_id, value_id)| {
                    constraint.types.contains(*type_id) && constraint.values.contains(*value_id)
                })
                .count();
            cardinality_allows(constraint.cardinality, count)
        }
        ResolvedItem::Group {
            cardinality,
            constraints,
        } => {
            // Key 0 holds genuinely ungrouped attributes and never
            // satisfies a group constraint.
            let qualifying = groups
                .iter()
                .filter(|(key, _)| **key != 0)
                .filter(|(_, members)| {
                    constraints.iter().all(|constraint| {
                        let count = members
                            .iter()
                            .filter(|(type_id, value_id)| {
                                constraint.types.contains(*type_id)
                                    && constraint.values.contains(*value_id)
                            })
                            .count();
                        cardinality_allows(constraint.cardinality, count)
                    })
                })
                .count();
            cardinality_allows(*cardinality, qualifying)
        }
    }
}

fn cardinality_allows(cardinality: Option<Cardinality>, count: usize) -> bool {
    match cardinality {
        None => count >= 1,
        Some(cardinality) => {
            let count = u32::try_from(count).unwrap_or(u32::MAX);
            cardinality.allows(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchStore;
    use crate::ecl::parser::parse_ecl;
    use termgraph_types::well_known;

    /// In-memory graph builder committing everything to MAIN at once.
    struct Fixture {
        branches: BranchStore,
        concepts: VersionedStore<Concept>,
        relationships: VersionedStore<Relationship>,
        members: VersionedStore<RefsetMember>,
        closure: ClosureIndex,
        next_rel_id: SctId,
        timepoint: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let mut branches = BranchStore::new();
            branches.create("MAIN").unwrap();
            let timepoint = branches.next_timepoint();
            Self {
                branches,
                concepts: VersionedStore::new(),
                relationships: VersionedStore::new(),
                members: VersionedStore::new(),
                closure: ClosureIndex::new(),
                next_rel_id: 1_000_000,
                timepoint,
            }
        }

        fn concept(&mut self, id: SctId, origin: DefinitionOrigin) -> &mut Self {
            self.concepts.upsert(
                "MAIN",
                self.timepoint,
                Concept {
                    id,
                    active: true,
                    module_id: well_known::CORE_MODULE,
                    origin,
                },
            );
            self
        }

        fn relationship(&mut self, source: SctId, type_id: SctId, dest: SctId, group: u16) {
            self.next_rel_id += 1;
            self.relationships.upsert(
                "MAIN",
                self.timepoint,
                Relationship {
                    id: self.next_rel_id,
                    active: true,
                    module_id: well_known::CORE_MODULE,
                    source_id: source,
                    destination_id: dest,
                    type_id,
                    group,
                    form: Form::Inferred,
                },
            );
        }

        fn is_a(&mut self, child: SctId, parent: SctId) {
            self.relationship(child, well_known::IS_A, parent, 0);
        }

        fn member(&mut self, id: SctId, refset: SctId, referenced: SctId) {
            self.members.upsert(
                "MAIN",
                self.timepoint,
                RefsetMember {
                    id,
                    active: true,
                    module_id: well_known::CORE_MODULE,
                    refset_id: refset,
                    referenced_component_id: referenced,
                },
            );
        }

        /// Rebuilds the closure from the committed is-a edges and advances
        /// the branch head.
        fn finish(&mut self) {
            let snapshot = self
                .branches
                .staged_snapshot("MAIN", self.timepoint)
                .unwrap();
            let mut parents: HashMap<SctId, Vec<SctId>> = HashMap::new();
            for rel in self.relationships.iter_visible(&snapshot) {
                if rel.is_is_a() && rel.active && rel.form == Form::Inferred {
                    parents.entry(rel.source_id).or_default().push(rel.destination_id);
                }
            }
            let roots: Vec<SctId> = parents.keys().copied().collect();
            let parents_of = move |id: SctId| parents.get(&id).cloned().unwrap_or_default();
            self.closure
                .apply_hierarchy_change("MAIN", Form::Inferred, &roots, parents_of)
                .unwrap();
            self.branches.advance_head("MAIN", self.timepoint).unwrap();
        }

        fn select(&self, ecl: &str) -> Vec<SctId> {
            self.select_at(ecl, None)
        }

        fn select_at(&self, ecl: &str, timepoint: Option<u64>) -> Vec<SctId> {
            let snapshot = self.branches.resolve_snapshot("MAIN", timepoint).unwrap();
            let ctx = EvalContext {
                snapshot: &snapshot,
                form: Form::Inferred,
                concepts: &self.concepts,
                relationships: &self.relationships,
                members: &self.members,
                closure: &self.closure,
                pinned: timepoint.is_some(),
            };
            let node = parse_ecl(ecl).unwrap();
            evaluate(&node, &ctx, None, None).unwrap().ids
        }
    }

    const FINDING_A: SctId = 100_001;
    const FINDING_B: SctId = 100_002;
    const FINDING_UNGROUPED: SctId = 100_003;
    const FINDING_AXIOM: SctId = 100_004;
    const STENOSIS: SctId = 200_001;
    const HEART: SctId = 300_001;
    const LUNG: SctId = 300_002;
    const REFSET: SctId = 700_001;

    /// Clinical findings with finding-site attributes in varying grouping
    /// shapes, all under the clinical-finding top-level concept.
    fn fixture() -> Fixture {
        let mut fx = Fixture::new();
        fx.concept(well_known::ROOT, DefinitionOrigin::Statement);
        fx.concept(well_known::CLINICAL_FINDING, DefinitionOrigin::Statement);
        fx.concept(well_known::BODY_STRUCTURE, DefinitionOrigin::Statement);
        fx.concept(HEART, DefinitionOrigin::Statement);
        fx.concept(LUNG, DefinitionOrigin::Statement);
        fx.concept(STENOSIS, DefinitionOrigin::Statement);
        fx.concept(FINDING_A, DefinitionOrigin::Statement);
        fx.concept(FINDING_B, DefinitionOrigin::Statement);
        fx.concept(FINDING_UNGROUPED, DefinitionOrigin::Statement);
        fx.concept(FINDING_AXIOM, DefinitionOrigin::Axiom);

        fx.is_a(well_known::CLINICAL_FINDING, well_known::ROOT);
        fx.is_a(well_known::BODY_STRUCTURE, well_known::ROOT);
        fx.is_a(HEART, well_known::BODY_STRUCTURE);
        fx.is_a(LUNG, well_known::BODY_STRUCTURE);
        for finding in [FINDING_A, FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM] {
            fx.is_a(finding, well_known::CLINICAL_FINDING);
        }

        // A: one group { finding-site = heart, morphology = stenosis }.
        fx.relationship(FINDING_A, well_known::FINDING_SITE, HEART, 1);
        fx.relationship(FINDING_A, well_known::ASSOCIATED_MORPHOLOGY, STENOSIS, 1);
        // B: two groups with different finding sites.
        fx.relationship(FINDING_B, well_known::FINDING_SITE, HEART, 1);
        fx.relationship(FINDING_B, well_known::FINDING_SITE, LUNG, 2);
        // Ungrouped (statement form): two finding sites in group 0.
        fx.relationship(FINDING_UNGROUPED, well_known::FINDING_SITE, HEART, 0);
        fx.relationship(FINDING_UNGROUPED, well_known::FINDING_SITE, LUNG, 0);
        // Axiom-defined: same shape as above, but each group-0 attribute
        // forms its own implicit group.
        fx.relationship(FINDING_AXIOM, well_known::FINDING_SITE, HEART, 0);
        fx.relationship(FINDING_AXIOM, well_known::FINDING_SITE, LUNG, 0);

        fx.member(1, REFSET, FINDING_A);
        fx.member(2, REFSET, FINDING_B);

        fx.finish();
        fx
    }

    #[test]
    fn test_descendant_operators() {
        let fx = fixture();
        let all_findings = vec![FINDING_A, FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM];

        assert_eq!(fx.select(&format!("< {}", well_known::CLINICAL_FINDING)), all_findings);

        let mut with_self = all_findings.clone();
        with_self.push(well_known::CLINICAL_FINDING);
        with_self.sort_unstable();
        assert_eq!(fx.select(&format!("<< {}", well_known::CLINICAL_FINDING)), with_self);
    }

    #[test]
    fn test_ancestor_operators() {
        let fx = fixture();
        assert_eq!(
            fx.select(&format!("> {}", HEART)),
            vec![well_known::BODY_STRUCTURE, well_known::ROOT]
        );
        assert_eq!(
            fx.select(&format!(">> {}", HEART)),
            vec![HEART, well_known::BODY_STRUCTURE, well_known::ROOT]
        );
    }

    #[test]
    fn test_and_or_minus() {
        let fx = fixture();
        let cf = well_known::CLINICAL_FINDING;

        assert_eq!(
            fx.select(&format!("< {} AND (<< {} OR << {})", cf, FINDING_A, FINDING_B)),
            vec![FINDING_A, FINDING_B]
        );
        assert_eq!(
            fx.select(&format!("< {} MINUS {}", cf, FINDING_A)),
            vec![FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]
        );
        // AND with the universe is the identity.
        assert_eq!(
            fx.select(&format!("* AND < {}", cf)),
            fx.select(&format!("< {}", cf))
        );
    }

    #[test]
    fn test_member_of() {
        let fx = fixture();
        assert_eq!(fx.select(&format!("^ {}", REFSET)), vec![FINDING_A, FINDING_B]);
        // ^ * unions every refset.
        assert_eq!(fx.select("^ *"), vec![FINDING_A, FINDING_B]);
        assert_eq!(fx.select("^ 999"), Vec::<SctId>::new());
    }

    #[test]
    fn test_refinement_ungrouped_attribute() {
        let fx = fixture();
        // Any finding with a finding site of heart, grouped or not.
        assert_eq!(
            fx.select(&format!(
                "< {} : {} = {}",
                well_known::CLINICAL_FINDING,
                well_known::FINDING_SITE,
                HEART
            )),
            vec![FINDING_A, FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]
        );
        // Value reached through the hierarchy.
        assert_eq!(
            fx.select(&format!(
                "< {} : {} = << {}",
                well_known::CLINICAL_FINDING,
                well_known::FINDING_SITE,
                well_known::BODY_STRUCTURE
            )),
            vec![FINDING_A, FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]
        );
    }

    #[test]
    fn test_refinement_attribute_cardinality() {
        let fx = fixture();
        // Exactly two finding sites.
        assert_eq!(
            fx.select(&format!(
                "< {} : [2..2] {} = *",
                well_known::CLINICAL_FINDING,
                well_known::FINDING_SITE
            )),
            vec![FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]
        );
        // [0..0] selects findings with no morphology at all.
        assert_eq!(
            fx.select(&format!(
                "< {} : [0..0] {} = *",
                well_known::CLINICAL_FINDING,
                well_known::ASSOCIATED_MORPHOLOGY
            )),
            vec![FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]
        );
    }

    #[test]
    fn test_group_counts_distinct_groups() {
        let fx = fixture();
        let one_group = fx.select(&format!(
            "< {} : [1..1] {{ {} = * }}",
            well_known::CLINICAL_FINDING,
            well_known::FINDING_SITE
        ));
        // A has one group; B has two; ungrouped statement attributes never
        // form a group; axiom group-0 attributes each form their own.
        assert_eq!(one_group, vec![FINDING_A]);

        let two_groups = fx.select(&format!(
            "< {} : [2..2] {{ {} = * }}",
            well_known::CLINICAL_FINDING,
            well_known::FINDING_SITE
        ));
        assert_eq!(two_groups, vec![FINDING_B, FINDING_AXIOM]);
    }

    #[test]
    fn test_group_co_occurrence() {
        let fx = fixture();
        // Both attributes must sit in the same group: only A qualifies.
        assert_eq!(
            fx.select(&format!(
                "< {} : {{ {} = *, {} = * }}",
                well_known::CLINICAL_FINDING,
                well_known::FINDING_SITE,
                well_known::ASSOCIATED_MORPHOLOGY
            )),
            vec![FINDING_A]
        );
    }

    #[test]
    fn test_dotted_collects_attribute_values() {
        let fx = fixture();
        assert_eq!(
            fx.select(&format!("{} . {}", FINDING_B, well_known::FINDING_SITE)),
            vec![HEART, LUNG]
        );
    }

    #[test]
    fn test_multiple_refinement_items_are_conjunctive() {
        let fx = fixture();
        assert_eq!(
            fx.select(&format!(
                "< {} : {} = {}, {} = {}",
                well_known::CLINICAL_FINDING,
                well_known::FINDING_SITE,
                HEART,
                well_known::ASSOCIATED_MORPHOLOGY,
                STENOSIS
            )),
            vec![FINDING_A]
        );
    }

    #[test]
    fn test_wildcard_universe_is_active_concepts() {
        let fx = fixture();
        assert_eq!(fx.select("*").len(), 10);
    }

    #[test]
    fn test_pagination_and_filter() {
        let fx = fixture();
        let snapshot = fx.branches.resolve_snapshot("MAIN", None).unwrap();
        let ctx = EvalContext {
            snapshot: &snapshot,
            form: Form::Inferred,
            concepts: &fx.concepts,
            relationships: &fx.relationships,
            members: &fx.members,
            closure: &fx.closure,
            pinned: false,
        };
        let node = parse_ecl(&format!("< {}", well_known::CLINICAL_FINDING)).unwrap();

        let page = evaluate(&node, &ctx, None, Some(Page { offset: 1, limit: 2 })).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.ids, vec![FINDING_B, FINDING_UNGROUPED]);

        let filter = HashSet::from([FINDING_A, HEART]);
        let filtered = evaluate(&node, &ctx, Some(&filter), None).unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.ids, vec![FINDING_A]);
    }

    #[test]
    fn test_reference_ids_match_without_concept_records() {
        let fx = fixture();
        // The fixture never commits concept records for the finding-site
        // attribute or the refset; both still resolve by id.
        assert_eq!(
            fx.select(&format!("* : {} = *", well_known::FINDING_SITE)),
            vec![FINDING_A, FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]
        );
        assert_eq!(fx.select(&format!("^ {}", REFSET)), vec![FINDING_A, FINDING_B]);
        // As a focus, an id with no concept record selects nothing.
        assert_eq!(
            fx.select(&well_known::FINDING_SITE.to_string()),
            Vec::<SctId>::new()
        );
    }

    #[test]
    fn test_inactive_concept_excluded_from_hierarchy_results() {
        let mut fx = fixture();
        fx.timepoint = fx.branches.next_timepoint();
        fx.concepts.upsert(
            "MAIN",
            fx.timepoint,
            Concept {
                id: FINDING_A,
                active: false,
                module_id: well_known::CORE_MODULE,
                origin: DefinitionOrigin::Statement,
            },
        );
        fx.branches.advance_head("MAIN", fx.timepoint).unwrap();

        // The is-a edge is still active, so the closure still reaches
        // FINDING_A, but an inactive concept is never a result.
        let descendants = fx.select(&format!("< {}", well_known::CLINICAL_FINDING));
        assert_eq!(descendants, vec![FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]);
        let universe = fx.select("*");
        assert!(descendants.iter().all(|id| universe.contains(id)));
    }

    #[test]
    fn test_pinned_snapshot_uses_historical_hierarchy() {
        let mut fx = fixture();
        let pinned_at = fx.timepoint;
        fx.timepoint = fx.branches.next_timepoint();
        fx.concept(900_001, DefinitionOrigin::Statement);
        fx.is_a(900_001, well_known::CLINICAL_FINDING);
        fx.finish();

        let head = fx.select(&format!("< {}", well_known::CLINICAL_FINDING));
        assert!(head.contains(&900_001));

        // Pinned to before the second commit, the new concept is neither
        // a descendant nor part of the universe.
        let historical =
            fx.select_at(&format!("< {}", well_known::CLINICAL_FINDING), Some(pinned_at));
        assert_eq!(
            historical,
            vec![FINDING_A, FINDING_B, FINDING_UNGROUPED, FINDING_AXIOM]
        );
        assert!(!fx.select_at("*", Some(pinned_at)).contains(&900_001));
    }

    #[test]
    fn test_depth_limit() {
        let fx = fixture();
        let mut ecl = String::from("1");
        for _ in 0..80 {
            ecl = format!("({} OR 1)", ecl);
        }
        let snapshot = fx.branches.resolve_snapshot("MAIN", None).unwrap();
        let ctx = EvalContext {
            snapshot: &snapshot,
            form: Form::Inferred,
            concepts: &fx.concepts,
            relationships: &fx.relationships,
            members: &fx.members,
            closure: &fx.closure,
            pinned: false,
        };
        let node = parse_ecl(&ecl).unwrap();
        let err = evaluate(&node, &ctx, None, None).unwrap_err();
        assert!(matches!(err, EngineError::EvaluationError { .. }));
    }
}
