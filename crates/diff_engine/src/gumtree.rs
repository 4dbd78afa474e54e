//! GumTree two-phase tree matching

use crate::{NodeMappings, Result};
use ast_model::{AstTree, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Tuning knobs for the matcher
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GumTreeConfig {
    /// Subtrees shorter than this are ignored by the top-down phase
    pub min_height: usize,
    /// A bottom-up container match must score strictly above this
    pub min_dice: f64,
}

impl Default for GumTreeConfig {
    fn default() -> Self {
        Self {
            min_height: 1,
            min_dice: 0.5,
        }
    }
}

/// Nodes bucketed by subtree height, popped tallest bucket first
#[derive(Debug, Default)]
pub struct HeightList {
    buckets: BTreeMap<usize, Vec<NodeId>>,
}

impl HeightList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Height of the tallest bucketed node, 0 when empty
    pub fn max_height(&self) -> usize {
        self.buckets.keys().next_back().copied().unwrap_or(0)
    }

    pub fn push(&mut self, tree: &AstTree, id: NodeId) {
        let height = tree.height(&id);
        self.buckets.entry(height).or_default().push(id);
    }

    /// Remove and return the set of nodes at maximal height
    pub fn pop(&mut self) -> Vec<NodeId> {
        match self.buckets.keys().next_back().copied() {
            Some(height) => self.buckets.remove(&height).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Push every child of the given node
    pub fn open(&mut self, tree: &AstTree, id: &NodeId) {
        for child in tree.children(id) {
            self.push(tree, child);
        }
    }
}

/// Ratio of common mapped descendants between two nodes.
///
/// `2k / (|desc(x)| + |desc(y)|)` where `k` counts descendants of `x` whose
/// mapping image lies under `y`. Two childless nodes score 1 when their IDs
/// are equal, else 0. A shared ID doubles the score: editor IDs rarely
/// survive across versions by accident.
pub fn dice(
    source_tree: &AstTree,
    x: &NodeId,
    destination_tree: &AstTree,
    y: &NodeId,
    mappings: &NodeMappings,
) -> f64 {
    let descendants_x = source_tree.descendants(x);
    let descendants_y: HashSet<NodeId> = destination_tree.descendants(y).into_iter().collect();

    let total = descendants_x.len() + descendants_y.len();
    if total == 0 {
        return if x == y { 1.0 } else { 0.0 };
    }

    let common = descendants_x
        .iter()
        .filter(|descendant| {
            mappings
                .source_is_mapped_to(descendant)
                .is_some_and(|image| descendants_y.contains(image))
        })
        .count();

    let mut score = 2.0 * common as f64 / total as f64;
    if x == y {
        score *= 2.0;
    }
    score
}

/// Top-down phase: match identical subtrees as high as possible.
///
/// Equal-height candidate sets are compared pairwise; a pair with more than
/// one possible partner on either side is deferred and later resolved
/// greedily in descending order of parent similarity.
pub fn compute_topdown_mappings(
    source_tree: &AstTree,
    destination_tree: &AstTree,
    config: GumTreeConfig,
) -> Result<NodeMappings> {
    let mut mappings = NodeMappings::new();
    let mut candidates: Vec<(NodeId, NodeId)> = Vec::new();

    let mut source_list = HeightList::new();
    source_list.push(source_tree, source_tree.root().clone());
    let mut destination_list = HeightList::new();
    destination_list.push(destination_tree, destination_tree.root().clone());

    let source_nodes = source_tree.subtree_nodes(source_tree.root());
    let destination_nodes = destination_tree.subtree_nodes(destination_tree.root());

    loop {
        let max_source = source_list.max_height();
        let max_destination = destination_list.max_height();
        if max_source.min(max_destination) < config.min_height {
            break;
        }

        if max_source > max_destination {
            for node in source_list.pop() {
                source_list.open(source_tree, &node);
            }
        } else if max_destination > max_source {
            for node in destination_list.pop() {
                destination_list.open(destination_tree, &node);
            }
        } else {
            let top_source = source_list.pop();
            let top_destination = destination_list.pop();
            tracing::debug!(
                height = max_source,
                source = top_source.len(),
                destination = top_destination.len(),
                "comparing equal-height subtree sets",
            );

            let mut absorbed_source: HashSet<NodeId> = HashSet::new();
            let mut absorbed_destination: HashSet<NodeId> = HashSet::new();

            for x in &top_source {
                for y in &top_destination {
                    if !source_tree.equivalent(x, destination_tree, y) {
                        continue;
                    }
                    let ambiguous = source_nodes
                        .iter()
                        .any(|other| other != x && source_tree.equivalent(other, destination_tree, y))
                        || destination_nodes
                            .iter()
                            .any(|other| other != y && source_tree.equivalent(x, destination_tree, other));
                    if ambiguous {
                        tracing::trace!(x = %x, y = %y, "deferred ambiguous match");
                        candidates.push((x.clone(), y.clone()));
                    } else {
                        tracing::trace!(x = %x, y = %y, "isolated subtree match");
                        mappings.add_with_descendants(source_tree, destination_tree, x, y)?;
                    }
                    absorbed_source.insert(x.clone());
                    absorbed_destination.insert(y.clone());
                }
            }

            for node in &top_source {
                if !absorbed_source.contains(node) {
                    source_list.open(source_tree, node);
                }
            }
            for node in &top_destination {
                if !absorbed_destination.contains(node) {
                    destination_list.open(destination_tree, node);
                }
            }
        }
    }

    // prefer the candidate whose parents share the most matched context
    let mut scored: Vec<(f64, NodeId, NodeId)> = candidates
        .into_iter()
        .map(|(x, y)| {
            let score = match (source_tree.parent(&x), destination_tree.parent(&y)) {
                (Some(px), Some(py)) => dice(source_tree, px, destination_tree, py, &mappings),
                _ => 0.0,
            };
            (score, x, y)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    while !scored.is_empty() {
        let (score, x, y) = scored.remove(0);
        tracing::trace!(x = %x, y = %y, score, "accepted candidate match");
        mappings.add_with_descendants(source_tree, destination_tree, &x, &y)?;
        scored.retain(|(_, other_x, other_y)| other_x != &x && other_y != &y);
    }

    Ok(mappings)
}

/// Bottom-up phase: match containers whose descendants already correspond.
///
/// Unmatched non-leaf source nodes are visited in postorder; the unmatched
/// destination node of the same variant with the best dice score above the
/// threshold becomes the partner.
pub fn compute_bottom_up_mappings(
    source_tree: &AstTree,
    destination_tree: &AstTree,
    mut mappings: NodeMappings,
    config: GumTreeConfig,
) -> Result<NodeMappings> {
    let destination_nodes = destination_tree.subtree_nodes(destination_tree.root());

    for x in source_tree.postorder(source_tree.root()) {
        if mappings.source_is_mapped(&x) || !source_tree.has_children(&x) {
            continue;
        }
        let kind = &source_tree.node(&x)?.kind;

        let mut scored: Vec<(f64, &NodeId)> = destination_nodes
            .iter()
            .filter(|y| !mappings.destination_is_mapped(y))
            .filter(|y| {
                destination_tree
                    .get(y)
                    .is_some_and(|node| node.kind.same_kind(kind))
            })
            .map(|y| (dice(source_tree, &x, destination_tree, y, &mappings), y))
            .collect();
        if scored.is_empty() {
            continue;
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let (best, y) = (scored[0].0, scored[0].1.clone());
        if best > config.min_dice {
            tracing::trace!(x = %x, y = %y, score = best, "container match");
            mappings.add(source_tree, destination_tree, &x, &y)?;
        }
    }

    Ok(mappings)
}

/// Recovery pass: pair unmatched children of matched containers where the
/// correspondence is unambiguous by construction.
///
/// Fields and inputs pair by name under matched blocks; expressions of
/// matched inputs pair when they share a variant. Neither phase above can
/// produce these pairs (top-down demands full equivalence, bottom-up skips
/// leaves), yet they are exactly the pairs scalar updates are made of.
/// This fills the recovery-mapping role of the original GumTree algorithm
/// with name identity instead of bounded edit distance.
fn recover_child_mappings(
    source_tree: &AstTree,
    destination_tree: &AstTree,
    mappings: &mut NodeMappings,
) -> Result<()> {
    loop {
        let mut additions: Vec<(NodeId, NodeId)> = Vec::new();
        for (x, y) in mappings.iter() {
            let node_x = source_tree.node(x)?;
            let node_y = destination_tree.node(y)?;
            match (&node_x.kind, &node_y.kind) {
                (NodeKind::Block { .. }, NodeKind::Block { .. }) => {
                    for child_x in source_tree.children(x) {
                        if mappings.source_is_mapped(&child_x) {
                            continue;
                        }
                        let partner = match &source_tree.node(&child_x)?.kind {
                            NodeKind::Field { name, .. } => destination_tree.find_field(y, name),
                            NodeKind::Input { name, .. } => destination_tree.find_input(y, name),
                            _ => None,
                        };
                        if let Some(child_y) = partner {
                            if !mappings.destination_is_mapped(&child_y) {
                                additions.push((child_x, child_y));
                            }
                        }
                    }
                }
                (
                    NodeKind::Input { expression: Some(expression_x), .. },
                    NodeKind::Input { expression: Some(expression_y), .. },
                ) => {
                    if !mappings.source_is_mapped(expression_x)
                        && !mappings.destination_is_mapped(expression_y)
                        && source_tree
                            .node(expression_x)?
                            .kind
                            .same_kind(&destination_tree.node(expression_y)?.kind)
                    {
                        additions.push((expression_x.clone(), expression_y.clone()));
                    }
                }
                _ => {}
            }
        }

        if additions.is_empty() {
            return Ok(());
        }
        for (x, y) in additions {
            if !mappings.source_is_mapped(&x) && !mappings.destination_is_mapped(&y) {
                tracing::trace!(x = %x, y = %y, "recovered child mapping");
                mappings.add(source_tree, destination_tree, &x, &y)?;
            }
        }
    }
}

/// Match two trees with the GumTree algorithm under default parameters
pub fn compute_gumtree_mappings(
    source_tree: &AstTree,
    destination_tree: &AstTree,
) -> Result<NodeMappings> {
    compute_gumtree_mappings_with_config(source_tree, destination_tree, GumTreeConfig::default())
}

/// Match two trees with the GumTree algorithm.
///
/// Matching never fails on tree content; nodes may simply remain unmatched.
/// Consistency of the mapping store is audited after every phase.
pub fn compute_gumtree_mappings_with_config(
    source_tree: &AstTree,
    destination_tree: &AstTree,
    config: GumTreeConfig,
) -> Result<NodeMappings> {
    let mut mappings = compute_topdown_mappings(source_tree, destination_tree, config)?;
    mappings.check(source_tree, destination_tree);
    tracing::debug!(pairs = mappings.len(), "top-down phase complete");

    // the roots are both programs and the synthesizer needs them paired
    if !mappings.source_is_mapped(source_tree.root())
        && !mappings.destination_is_mapped(destination_tree.root())
    {
        mappings.add(
            source_tree,
            destination_tree,
            source_tree.root(),
            destination_tree.root(),
        )?;
    }

    let mut mappings =
        compute_bottom_up_mappings(source_tree, destination_tree, mappings, config)?;
    mappings.check(source_tree, destination_tree);
    tracing::debug!(pairs = mappings.len(), "bottom-up phase complete");

    recover_child_mappings(source_tree, destination_tree, &mut mappings)?;
    mappings.check(source_tree, destination_tree);
    tracing::debug!(pairs = mappings.len(), "recovery pass complete");

    Ok(mappings)
}
