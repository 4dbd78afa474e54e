//! Bidirectional node correspondence between two trees

use crate::{DiffError, Result};
use ast_model::{AstTree, NodeId};
use std::collections::HashMap;

/// A one-to-one partial correspondence between the nodes of a source tree
/// and the nodes of a destination tree.
///
/// Both direction indexes are updated together. Pairs always relate nodes
/// of the same variant; `add` overwrites existing mappings for either side
/// (last write wins). The mapping stores IDs only and must not outlive the
/// trees it was built against.
#[derive(Debug, Clone, Default)]
pub struct NodeMappings {
    source_to_destination: HashMap<NodeId, NodeId>,
    destination_to_source: HashMap<NodeId, NodeId>,
}

impl NodeMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.source_to_destination.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_to_destination.is_empty()
    }

    /// Record a pair. Fails if the two nodes are different variants;
    /// existing mappings of either node are displaced.
    pub fn add(
        &mut self,
        source_tree: &AstTree,
        destination_tree: &AstTree,
        source: &NodeId,
        destination: &NodeId,
    ) -> Result<()> {
        let source_kind = &source_tree.node(source)?.kind;
        let destination_kind = &destination_tree.node(destination)?.kind;
        if !source_kind.same_kind(destination_kind) {
            return Err(DiffError::MappingKindMismatch {
                source_id: source.clone(),
                destination: destination.clone(),
            });
        }

        if let Some(stale) = self
            .source_to_destination
            .insert(source.clone(), destination.clone())
        {
            if &stale != destination {
                self.destination_to_source.remove(&stale);
            }
        }
        if let Some(stale) = self
            .destination_to_source
            .insert(destination.clone(), source.clone())
        {
            if &stale != source {
                self.source_to_destination.remove(&stale);
            }
        }
        Ok(())
    }

    /// Record a pair together with all descendants, paired positionally in
    /// depth-first order. Fails if the subtrees differ in size.
    pub fn add_with_descendants(
        &mut self,
        source_tree: &AstTree,
        destination_tree: &AstTree,
        source: &NodeId,
        destination: &NodeId,
    ) -> Result<()> {
        let source_nodes = source_tree.subtree_nodes(source);
        let destination_nodes = destination_tree.subtree_nodes(destination);
        if source_nodes.len() != destination_nodes.len() {
            return Err(DiffError::MappingArityMismatch {
                source_id: source.clone(),
                destination: destination.clone(),
            });
        }
        for (s, d) in source_nodes.iter().zip(destination_nodes.iter()) {
            self.add(source_tree, destination_tree, s, d)?;
        }
        Ok(())
    }

    pub fn source_is_mapped(&self, source: &NodeId) -> bool {
        self.source_to_destination.contains_key(source)
    }

    pub fn source_is_mapped_to(&self, source: &NodeId) -> Option<&NodeId> {
        self.source_to_destination.get(source)
    }

    pub fn destination_is_mapped(&self, destination: &NodeId) -> bool {
        self.destination_to_source.contains_key(destination)
    }

    pub fn destination_is_mapped_to(&self, destination: &NodeId) -> Option<&NodeId> {
        self.destination_to_source.get(destination)
    }

    pub fn contains_pair(&self, source: &NodeId, destination: &NodeId) -> bool {
        self.source_to_destination.get(source) == Some(destination)
    }

    /// Iterate over (source, destination) pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.source_to_destination.iter()
    }

    pub fn sources(&self) -> impl Iterator<Item = &NodeId> {
        self.source_to_destination.keys()
    }

    pub fn destinations(&self) -> impl Iterator<Item = &NodeId> {
        self.destination_to_source.keys()
    }

    /// Consistency audit. Panics on a broken bijection or a variant
    /// mismatch; both indicate a matcher bug, not a caller error.
    pub fn check(&self, source_tree: &AstTree, destination_tree: &AstTree) {
        assert_eq!(
            self.source_to_destination.len(),
            self.destination_to_source.len(),
            "mapping direction indexes disagree in size",
        );
        for (source, destination) in &self.source_to_destination {
            assert_eq!(
                self.destination_to_source.get(destination),
                Some(source),
                "mapping {source} -> {destination} has no reverse entry",
            );
            let source_node = source_tree
                .get(source)
                .unwrap_or_else(|| panic!("mapped source {source} is not in the tree"));
            let destination_node = destination_tree
                .get(destination)
                .unwrap_or_else(|| panic!("mapped destination {destination} is not in the tree"));
            assert!(
                source_node.kind.same_kind(&destination_node.kind),
                "mapping {source} -> {destination} pairs different node kinds",
            );
        }
    }
}
