//! Scalar updates

use crate::{DiffError, Result};
use ast_model::{AstTree, NodeId, NodeKind, Tag};
use serde::{Deserialize, Serialize};

/// Replace the scalar attribute of a node.
///
/// Blocks update their opcode, fields and literals their value, inputs
/// their name (which re-sorts the owning block's input list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Update {
    pub node_id: NodeId,
    pub value: String,
}

impl Update {
    /// Compute the update turning `a` into `b`, or `None` when no surface
    /// scalar differs. Field pairs with different names have no update.
    pub fn compute(
        source_tree: &AstTree,
        a: &NodeId,
        destination_tree: &AstTree,
        b: &NodeId,
    ) -> Option<Update> {
        let node_a = source_tree.get(a)?;
        let node_b = destination_tree.get(b)?;
        let (from, to) = match (&node_a.kind, &node_b.kind) {
            (NodeKind::Block { opcode: from, .. }, NodeKind::Block { opcode: to, .. }) => {
                (from, to)
            }
            (NodeKind::Literal { value: from }, NodeKind::Literal { value: to }) => (from, to),
            (
                NodeKind::Field { name: name_a, value: from },
                NodeKind::Field { name: name_b, value: to },
            ) => {
                if name_a != name_b {
                    return None;
                }
                (from, to)
            }
            (NodeKind::Input { name: from, .. }, NodeKind::Input { name: to, .. }) => (from, to),
            _ => return None,
        };
        if from == to {
            return None;
        }
        Some(Update {
            node_id: a.clone(),
            value: to.clone(),
        })
    }

    pub fn apply(&self, tree: &mut AstTree) -> Result<Option<NodeId>> {
        tracing::debug!(node = %self.node_id, value = %self.value, "update node");
        let kind = tree.node(&self.node_id)?.kind.label();
        match kind {
            "block" => tree.set_opcode(&self.node_id, &self.value)?,
            "field" => tree.set_field_value(&self.node_id, &self.value)?,
            "literal" => tree.set_literal_value(&self.node_id, &self.value)?,
            "input" => tree.rename_input(&self.node_id, &self.value)?,
            _ => return Err(DiffError::InvalidUpdate(self.node_id.clone())),
        }
        tree.push_tag(&self.node_id, Tag::Updated)?;
        Ok(None)
    }
}
